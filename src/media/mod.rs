/// Image file handling
///
/// This module handles:
/// - Listing the images in a folder in Explorer order
/// - Reading embedded EXIF metadata
/// - Decoding downscaled display bitmaps

pub mod exif;
pub mod preview;
pub mod scan;
