pub const APP_ID: &str = "imgfetch";
pub const WINDOW_TITLE: &str = "Image Fetch";
pub const WINDOW_SIZE: [f32; 2] = [720.0, 560.0];
pub const MIN_WINDOW_SIZE: [f32; 2] = [360.0, 280.0];

pub const URL_HINT: &str = "https://example.com/picture.png";
pub const DOWNLOAD_LABEL: &str = "Download";
pub const DISMISS_LABEL: &str = "Dismiss";
pub const EMPTY_HINT: &str = "Enter an image URL and press Download.";
/// Space reserved right of the URL field for the button and spinner.
pub const URL_ROW_RESERVED_WIDTH: f32 = 120.0;
