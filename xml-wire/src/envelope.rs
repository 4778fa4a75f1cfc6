use crate::{DecodeError, Document, ScopedDecoder};
use std::fmt;

/// Fields every error payload carries, whether or not its code is modeled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMetadata {
    code: Option<String>,
    message: Option<String>,
    kind: Option<String>,
    request_id: Option<String>,
}

impl ErrorMetadata {
    /// Reads the error document. With `wrapped` the root must be
    /// `<ErrorResponse>` holding `<Error>`, otherwise the root itself must be
    /// `<Error>`, the same envelope [`within_error`] expects.
    pub fn parse(input: &[u8], wrapped: bool) -> Result<ErrorMetadata, DecodeError> {
        let mut doc = Document::try_from_bytes(input)?;
        let mut root = doc.root_element()?;
        let mut meta = ErrorMetadata::default();
        if !wrapped {
            root.expect_element("Error")?;
            meta.read_error(&mut root)?;
            return Ok(meta);
        }
        root.expect_element("ErrorResponse")?;
        let mut found = false;
        while let Some(mut tag) = root.next_tag()? {
            if !found && tag.start_el().matches("Error") {
                meta.read_error(&mut tag)?;
                found = true;
            } else if tag.start_el().matches("RequestId") {
                meta.request_id = Some(tag.read_text()?);
            }
        }
        if !found {
            return Err(DecodeError::MissingElement("Error".into()));
        }
        Ok(meta)
    }

    fn read_error(&mut self, decoder: &mut ScopedDecoder<'_, '_>) -> Result<(), DecodeError> {
        while let Some(mut tag) = decoder.next_tag()? {
            let field = match tag.start_el().name().local() {
                "Code" => &mut self.code,
                "Message" => &mut self.message,
                "Type" => &mut self.kind,
                "RequestId" => &mut self.request_id,
                _ => continue,
            };
            *field = Some(tag.read_text()?);
        }
        Ok(())
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// `Sender` or `Receiver`, when the service says.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

impl fmt::Display for ErrorMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code().unwrap_or("unknown error"))?;
        if let Some(message) = self.message() {
            write!(f, ": {message}")?;
        }
        if let Some(request_id) = self.request_id() {
            write!(f, " (request id {request_id})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorMetadata {}

/// Runs `decode` on the `<Error>` element of an error document.
///
/// With `wrapped` the document root must be `<ErrorResponse>` holding the
/// `<Error>` element, otherwise the root itself must be `<Error>`.
pub fn within_error<T>(
    input: &[u8],
    wrapped: bool,
    decode: impl FnOnce(&mut ScopedDecoder<'_, '_>) -> Result<T, DecodeError>,
) -> Result<T, DecodeError> {
    let mut doc = Document::try_from_bytes(input)?;
    let mut root = doc.root_element()?;
    if !wrapped {
        root.expect_element("Error")?;
        return decode(&mut root);
    }
    root.expect_element("ErrorResponse")?;
    while let Some(mut tag) = root.next_tag()? {
        if tag.start_el().matches("Error") {
            return decode(&mut tag);
        }
    }
    Err(DecodeError::MissingElement("Error".into()))
}
