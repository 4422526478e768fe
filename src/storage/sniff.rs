/// Guesses a file extension from content alone.
pub trait TypeSniffer {
    /// Extension without the leading dot, never empty.
    fn detect_extension(&self, bytes: &[u8]) -> String;
}

/// Magic-number detection with `tree_magic_mini`, mapped to an extension via
/// `mime_guess`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MagicSniffer;

const FALLBACK_EXTENSION: &str = "bin";

impl TypeSniffer for MagicSniffer {
    fn detect_extension(&self, bytes: &[u8]) -> String {
        let mime = tree_magic_mini::from_u8(bytes);
        log::debug!("sniffed content type {mime}");
        extension_for_mime(mime).to_string()
    }
}

/// mime_guess lists extensions alphabetically, which picks odd ones for a few
/// common types.
fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "application/octet-stream" => FALLBACK_EXTENSION,
        "text/plain" => "txt",
        "text/html" => "html",
        "image/jpeg" => "jpg",
        "image/tiff" => "tif",
        "audio/mpeg" => "mp3",
        "video/mpeg" => "mpg",
        _ => mime_guess::get_mime_extensions_str(mime)
            .and_then(|exts| exts.first().copied())
            .unwrap_or(FALLBACK_EXTENSION),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn png_bytes_get_png_extension() {
        assert_eq!(MagicSniffer.detect_extension(PNG_1X1), "png");
    }

    #[test]
    fn pdf_bytes_get_pdf_extension() {
        assert_eq!(MagicSniffer.detect_extension(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n"), "pdf");
    }

    #[test]
    fn preferred_extensions_override_alphabetical_order() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("application/octet-stream"), "bin");
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("x-no/such-type"), "bin");
    }
}
