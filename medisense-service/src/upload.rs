use image::ImageFormat;

/// DICOM files carry a 128-byte preamble followed by the `DICM` marker.
const DICOM_MARKER_OFFSET: usize = 128;

/// Accepted upload formats, identified by content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFormat {
    Jpeg,
    Png,
    Dicom,
}

impl UploadFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            UploadFormat::Jpeg => "jpg",
            UploadFormat::Png => "png",
            UploadFormat::Dicom => "dcm",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            UploadFormat::Jpeg => "image/jpeg",
            UploadFormat::Png => "image/png",
            UploadFormat::Dicom => "application/dicom",
        }
    }
}

/// Identify an upload by magic bytes. Declared filenames and content types
/// are not trusted.
pub fn sniff_format(bytes: &[u8]) -> Option<UploadFormat> {
    if bytes.len() > DICOM_MARKER_OFFSET + 4
        && &bytes[DICOM_MARKER_OFFSET..DICOM_MARKER_OFFSET + 4] == b"DICM"
    {
        return Some(UploadFormat::Dicom);
    }

    match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => Some(UploadFormat::Png),
        Ok(ImageFormat::Jpeg) => Some(UploadFormat::Jpeg),
        _ => None,
    }
}
