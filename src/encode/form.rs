//! Form fields and multipart parts attached to a request.

use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use crate::config::CONTENT_TYPE_OCTET_STREAM;
use crate::encode::content_type::guess_from_filename;

/// Payload of a multipart part.
pub enum PartPayload {
    /// In-memory bytes.
    Bytes(Vec<u8>),
    /// A file read when the body is written.
    File(PathBuf),
    /// A stream read once; a second send finds it empty.
    Reader(Option<Box<dyn Read + Send>>),
}

impl PartPayload {
    /// Payload length when it is known before writing.
    pub fn known_len(&self) -> Option<u64> {
        match self {
            PartPayload::Bytes(bytes) => Some(bytes.len() as u64),
            PartPayload::File(path) => std::fs::metadata(path).ok().map(|m| m.len()),
            PartPayload::Reader(_) => None,
        }
    }
}

impl fmt::Debug for PartPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartPayload::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            PartPayload::File(path) => f.debug_tuple("File").field(path).finish(),
            PartPayload::Reader(reader) => {
                write!(f, "Reader({})", if reader.is_some() { "unread" } else { "consumed" })
            }
        }
    }
}

/// A file-like part of a multipart body.
#[derive(Debug)]
pub struct MultipartPart {
    pub(crate) filename: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) payload: PartPayload,
}

impl MultipartPart {
    /// Part backed by a file; the filename defaults to the path's file name.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Self {
            filename,
            content_type: None,
            payload: PartPayload::File(path),
        }
    }

    /// Part backed by in-memory bytes.
    pub fn bytes(bytes: impl Into<Vec<u8>>, filename: Option<String>) -> Self {
        Self {
            filename,
            content_type: None,
            payload: PartPayload::Bytes(bytes.into()),
        }
    }

    /// Part backed by a stream of unknown length.
    pub fn reader(reader: impl Read + Send + 'static, filename: Option<String>) -> Self {
        Self {
            filename,
            content_type: None,
            payload: PartPayload::Reader(Some(Box::new(reader))),
        }
    }

    /// Overrides the filename sent in `Content-Disposition`.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets an explicit part Content-Type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Filename sent for this part, if any.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Content-Type written in the part header.
    ///
    /// An explicit type wins; otherwise a filename gets a type guessed from
    /// its extension, falling back to `application/octet-stream`. A part with
    /// neither gets no Content-Type line.
    pub fn effective_content_type(&self) -> Option<String> {
        if let Some(explicit) = &self.content_type {
            return Some(explicit.clone());
        }
        self.filename.as_deref().map(|name| {
            guess_from_filename(name)
                .unwrap_or(CONTENT_TYPE_OCTET_STREAM)
                .to_string()
        })
    }
}

/// Value of one form field.
#[derive(Debug)]
pub enum FormValue {
    /// Plain text value.
    Text(String),
    /// File-like part; its presence makes the body multipart.
    Part(MultipartPart),
}

/// One named form entry.
#[derive(Debug)]
pub struct FormField {
    pub(crate) name: String,
    pub(crate) value: FormValue,
}

impl FormField {
    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field value.
    pub fn value(&self) -> &FormValue {
        &self.value
    }
}

/// Ordered form fields; names may repeat.
#[derive(Debug, Default)]
pub struct Form {
    fields: Vec<FormField>,
}

impl Form {
    /// Empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a text field. Blank names are ignored.
    pub fn add_text(&mut self, name: &str, value: impl Into<String>) {
        if name.trim().is_empty() {
            return;
        }
        self.fields.push(FormField {
            name: name.to_string(),
            value: FormValue::Text(value.into()),
        });
    }

    /// Appends a file-like part. Blank names are ignored.
    pub fn add_part(&mut self, name: &str, part: MultipartPart) {
        if name.trim().is_empty() {
            return;
        }
        self.fields.push(FormField {
            name: name.to_string(),
            value: FormValue::Part(part),
        });
    }

    /// Whether any field is a file-like part.
    pub fn has_parts(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f.value, FormValue::Part(_)))
    }

    /// Text fields as `(name, value)` pairs, in order.
    pub fn text_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().filter_map(|f| match &f.value {
            FormValue::Text(value) => Some((f.name.as_str(), value.as_str())),
            FormValue::Part(_) => None,
        })
    }

    /// All fields, in order.
    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut [FormField] {
        &mut self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the form has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
