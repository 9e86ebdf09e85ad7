use bytes::Bytes;
use futures::executor::block_on;
use futures::stream;
use std::convert::Infallible;
use std::fmt;

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Form field name from `Content-Disposition`
    pub name: String,
    /// File name, present for file parts
    pub filename: Option<String>,
    /// Part `Content-Type`, if declared
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl Part {
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.filename.is_some()
    }

    /// Part bytes as text (lossy)
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartError {
    /// The body is not valid `multipart/form-data` for the boundary
    Malformed(String),
    /// A part has no `Content-Disposition: form-data; name=...`
    MissingName,
}

impl fmt::Display for MultipartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MultipartError::Malformed(reason) => write!(f, "invalid multipart body: {reason}"),
            MultipartError::MissingName => write!(f, "multipart part has no form-data name"),
        }
    }
}

impl std::error::Error for MultipartError {}

impl From<multer::Error> for MultipartError {
    fn from(err: multer::Error) -> Self {
        MultipartError::Malformed(err.to_string())
    }
}

/// Split a buffered `multipart/form-data` body into its parts.
///
/// The body is already in memory, so `multer` is driven over a single chunk and never
/// waits on I/O.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<Part>, MultipartError> {
    let chunk = Bytes::copy_from_slice(body);
    let source = stream::once(async move { Ok::<Bytes, Infallible>(chunk) });
    let mut multipart = multer::Multipart::new(source, boundary);

    block_on(async move {
        let mut parts = Vec::new();
        while let Some(field) = multipart.next_field().await? {
            let name = field
                .name()
                .map(str::to_string)
                .ok_or(MultipartError::MissingName)?;
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(ToString::to_string);
            let data = field.bytes().await?.to_vec();
            parts.push(Part {
                name,
                filename,
                content_type,
                data,
            });
        }
        Ok::<_, MultipartError>(parts)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = "--XyZ\r\n\
        Content-Disposition: form-data; name=\"token\"\r\n\r\n\
        abc\r\n\
        --XyZ\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
        Content-Type: text/plain\r\n\r\n\
        hello\r\nworld\r\n\
        --XyZ--\r\n";

    #[test]
    fn test_parse_text_and_file_parts() {
        let parts = parse_multipart(BODY.as_bytes(), "XyZ").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "token");
        assert_eq!(parts[0].text(), "abc");
        assert!(!parts[0].is_file());
        assert_eq!(parts[1].filename.as_deref(), Some("a.txt"));
        assert_eq!(parts[1].content_type.as_deref(), Some("text/plain"));
        assert_eq!(parts[1].data, b"hello\r\nworld");
    }

    #[test]
    fn test_closing_delimiter_without_trailing_crlf() {
        let body = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"token\"\r\n\r\n\
            abc\r\n\
            --XyZ--";
        let parts = parse_multipart(body.as_bytes(), "XyZ").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].text(), "abc");
    }

    #[test]
    fn test_truncated_part_is_malformed() {
        let body = "--XyZ\r\n\
            Content-Disposition: form-data; name=\"token\"\r\n\r\n\
            abc";
        let err = parse_multipart(body.as_bytes(), "XyZ").unwrap_err();
        assert!(matches!(err, MultipartError::Malformed(_)));
        assert!(err.to_string().starts_with("invalid multipart body"));
    }
}
