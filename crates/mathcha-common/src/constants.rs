//! Shared constants for Mathcha components.

/// Default demo server HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8890";

/// Default typesetter binary
pub const DEFAULT_TYPESETTER: &str = "latex";

/// Default rasterizer binary
pub const DEFAULT_RASTERIZER: &str = "dvipng";

/// Default foreground color
pub const DEFAULT_FOREGROUND: &str = "#000000";

/// Default background color (passed through to the rasterizer untouched)
pub const DEFAULT_BACKGROUND: &str = "Transparent";

/// Default rasterizer bounding mode
pub const DEFAULT_BOUNDING: &str = "tight";

/// Default rasterizer resolution (DPI)
pub const DEFAULT_RESOLUTION: u32 = 150;

/// Name of the working directory created under the system temp dir
pub const DEFAULT_WORK_DIR_NAME: &str = "mathcha";

/// Default minimum operator count per expression
pub const DEFAULT_MIN_OPS: usize = 1;

/// Default maximum operator count per expression
pub const DEFAULT_MAX_OPS: usize = 3;

/// Default value pool bounds (inclusive)
pub const DEFAULT_VALUE_RANGE: (i32, i32) = (1, 10);

/// Seconds a ready CAPTCHA lives before auto-cleanup (5 minutes)
pub const DEFAULT_CLEANUP_SECS: u64 = 300;

/// Default decimal places used when verifying answers
pub const DEFAULT_ANSWER_PLACES: u32 = 0;

/// Redraws attempted when a fresh expression collides with an in-flight key
pub const MAX_DRAW_ATTEMPTS: usize = 8;

/// Artifact extensions produced per key
pub mod artifacts {
    /// LaTeX source
    pub const SOURCE: &str = "tex";

    /// Typesetter auxiliary output
    pub const AUX: &str = "aux";

    /// Typesetter log
    pub const LOG: &str = "log";

    /// Device-independent intermediate
    pub const DVI: &str = "dvi";

    /// Rasterized image
    pub const IMAGE: &str = "png";

    /// Everything cleanup removes
    pub const ALL: [&str; 5] = [SOURCE, AUX, LOG, DVI, IMAGE];
}
