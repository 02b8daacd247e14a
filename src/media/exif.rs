//! Embedded EXIF metadata reading.
//!
//! Values are kept as the EXIF reader displays them; formatting for the info
//! lines happens in the UI.

use exif::{In, Tag, Value};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Decimal GPS position, south and west negative
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for GpsCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Camera and location data stored inside the image file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedMetadata {
    /// ExposureTime, e.g. "1/125"
    pub exposure_time: Option<String>,
    /// FNumber, e.g. "2.8"
    pub f_number: Option<String>,
    /// PhotographicSensitivity (ISOSpeedRatings)
    pub iso: Option<String>,
    pub focal_length: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub taken_at: Option<String>,
    pub gps: Option<GpsCoordinates>,
    /// Every readable primary-image tag as (name, value), for the detail panel
    pub tags: Vec<(String, String)>,
}

impl EmbeddedMetadata {
    /// Any exposure field is embedded
    pub fn has_camera(&self) -> bool {
        self.exposure_time.is_some() || self.f_number.is_some() || self.iso.is_some()
    }

    pub fn has_location(&self) -> bool {
        self.gps.is_some()
    }
}

/// Source of embedded metadata for the scheduler
pub trait MetadataSource: Send + Sync {
    /// Read metadata for `path`; `None` when the file is unreadable or has no EXIF
    fn read(&self, path: &Path) -> Option<EmbeddedMetadata>;
}

/// Reads EXIF from JPEG, TIFF, PNG, HEIF and WebP containers
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifReader;

impl MetadataSource for ExifReader {
    fn read(&self, path: &Path) -> Option<EmbeddedMetadata> {
        read_embedded_metadata(path)
    }
}

/// Read EXIF data from a file
pub fn read_embedded_metadata(path: &Path) -> Option<EmbeddedMetadata> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!("Cannot open {} for EXIF: {}", path.display(), e);
            return None;
        }
    };

    let exif = match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::debug!("No EXIF in {}: {}", path.display(), e);
            return None;
        }
    };

    Some(metadata_from_exif(&exif))
}

fn metadata_from_exif(exif: &exif::Exif) -> EmbeddedMetadata {
    let text = |tag: Tag| -> Option<String> {
        let field = exif.get_field(tag, In::PRIMARY)?;
        let value = field.display_value().to_string();
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| value.to_string())
    };

    let tags = exif
        .fields()
        .filter(|field| field.ifd_num == In::PRIMARY)
        // MakerNote and friends are opaque binary blobs
        .filter(|field| !matches!(field.value, Value::Undefined(..)))
        .map(|field| {
            (
                field.tag.to_string(),
                field.display_value().with_unit(exif).to_string(),
            )
        })
        .collect();

    EmbeddedMetadata {
        exposure_time: text(Tag::ExposureTime),
        f_number: text(Tag::FNumber),
        iso: text(Tag::PhotographicSensitivity),
        focal_length: text(Tag::FocalLength),
        make: text(Tag::Make),
        model: text(Tag::Model),
        taken_at: text(Tag::DateTimeOriginal),
        gps: extract_gps(exif),
        tags,
    }
}

/// Extract GPS coordinates as decimal (latitude, longitude)
fn extract_gps(exif: &exif::Exif) -> Option<GpsCoordinates> {
    let lat_field = exif.get_field(Tag::GPSLatitude, In::PRIMARY)?;
    let lon_field = exif.get_field(Tag::GPSLongitude, In::PRIMARY)?;

    let mut latitude = parse_gps_coordinate(&lat_field.value)?;
    let mut longitude = parse_gps_coordinate(&lon_field.value)?;

    // Apply reference (N/S for latitude, E/W for longitude)
    if reference_is(exif, Tag::GPSLatitudeRef, "S") {
        latitude = -latitude;
    }
    if reference_is(exif, Tag::GPSLongitudeRef, "W") {
        longitude = -longitude;
    }

    Some(GpsCoordinates {
        latitude,
        longitude,
    })
}

fn reference_is(exif: &exif::Exif, tag: Tag, expected: &str) -> bool {
    exif.get_field(tag, In::PRIMARY)
        .map(|field| field.display_value().to_string())
        .is_some_and(|value| value.trim().trim_matches('"').eq_ignore_ascii_case(expected))
}

/// Parse a degrees/minutes/seconds rational triple into decimal degrees.
///
/// Always returns the magnitude; the sign comes from the reference tag.
fn parse_gps_coordinate(value: &Value) -> Option<f64> {
    let Value::Rational(rats) = value else {
        return None;
    };
    if rats.len() < 3 || rats[..3].iter().any(|r| r.denom == 0) {
        return None;
    }
    Some(rats[0].to_f64() + rats[1].to_f64() / 60.0 + rats[2].to_f64() / 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::experimental::Writer;
    use exif::{Field, Rational};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn rational(num: u32, denom: u32) -> Rational {
        Rational { num, denom }
    }

    fn field(tag: Tag, value: Value) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value,
        }
    }

    /// Write a bare TIFF container holding `fields`
    fn tiff_with(fields: &[Field]) -> Vec<u8> {
        let mut writer = Writer::new();
        for field in fields {
            writer.push_field(field);
        }
        let mut buf = Cursor::new(Vec::new());
        writer.write(&mut buf, false).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_parse_gps_coordinate() {
        let value = Value::Rational(vec![rational(35, 1), rational(9, 1), rational(36, 1)]);
        let decimal = parse_gps_coordinate(&value).unwrap();
        assert!((decimal - 35.16).abs() < 1e-9);

        let zero_denom = Value::Rational(vec![rational(35, 0), rational(9, 1), rational(36, 1)]);
        assert_eq!(parse_gps_coordinate(&zero_denom), None);
        assert_eq!(parse_gps_coordinate(&Value::Short(vec![1, 2, 3])), None);
    }

    #[test]
    fn test_camera_and_location_flags() {
        let mut meta = EmbeddedMetadata::default();
        assert!(!meta.has_camera());
        assert!(!meta.has_location());

        meta.iso = Some("400".into());
        assert!(meta.has_camera());

        meta.gps = Some(GpsCoordinates {
            latitude: 37.5,
            longitude: 127.0,
        });
        assert!(meta.has_location());
    }

    #[test]
    fn test_reads_exposure_and_gps_from_file() {
        let bytes = tiff_with(&[
            field(Tag::Make, Value::Ascii(vec![b"Fujifilm".to_vec()])),
            field(Tag::PhotographicSensitivity, Value::Short(vec![400])),
            field(Tag::GPSLatitudeRef, Value::Ascii(vec![b"S".to_vec()])),
            field(
                Tag::GPSLatitude,
                Value::Rational(vec![rational(33, 1), rational(52, 1), rational(0, 1)]),
            ),
            field(Tag::GPSLongitudeRef, Value::Ascii(vec![b"E".to_vec()])),
            field(
                Tag::GPSLongitude,
                Value::Rational(vec![rational(151, 1), rational(12, 1), rational(0, 1)]),
            ),
        ]);
        let dir = tempdir().unwrap();
        let path = dir.path().join("sydney.tif");
        std::fs::write(&path, bytes).unwrap();

        let meta = read_embedded_metadata(&path).unwrap();
        assert_eq!(meta.iso.as_deref(), Some("400"));
        assert_eq!(meta.make.as_deref(), Some("Fujifilm"));
        assert!(meta.has_camera());
        let gps = meta.gps.unwrap();
        assert!((gps.latitude + 33.8666).abs() < 1e-3);
        assert!((gps.longitude - 151.2).abs() < 1e-3);
        assert!(meta.tags.iter().any(|(name, _)| name == "Make"));
    }

    #[test]
    fn test_file_without_exif() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.png");
        image::RgbImage::new(4, 4).save(&path).unwrap();
        assert_eq!(ExifReader.read(&path), None);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert_eq!(read_embedded_metadata(&dir.path().join("nope.jpg")), None);
    }

    #[test]
    fn test_gps_display() {
        let gps = GpsCoordinates {
            latitude: 35.158698,
            longitude: 129.160384,
        };
        assert_eq!(gps.to_string(), "35.158698, 129.160384");
    }
}
