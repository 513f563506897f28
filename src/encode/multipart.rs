//! `multipart/form-data` body encoding (RFC 2388).
//!
//! Layout per field, in declaration order:
//!
//! ```text
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="<name>"[; filename="<filename>"]\r\n
//! [Content-Type: <type>\r\n]
//! \r\n
//! <payload>\r\n
//! ```
//!
//! followed by `--<boundary>--\r\n`. Names and filenames are written as-is.

use std::fs::File;
use std::io::{self, Read, Write};
use std::sync::LazyLock;

use log::warn;
use rand::distr::{Alphanumeric, SampleString};

use crate::charset::Charset;
use crate::config::{
    CONTENT_TYPE_MULTIPART, COPY_BUFFER_SIZE, MULTIPART_BOUNDARY_PREFIX,
    MULTIPART_BOUNDARY_RANDOM_LEN,
};
use crate::encode::form::{Form, FormValue, PartPayload};

static BOUNDARY: LazyLock<String> = LazyLock::new(|| {
    let suffix = Alphanumeric.sample_string(&mut rand::rng(), MULTIPART_BOUNDARY_RANDOM_LEN);
    format!("{MULTIPART_BOUNDARY_PREFIX}{suffix}")
});

/// Boundary shared by every multipart body this process writes.
pub fn boundary() -> &'static str {
    &BOUNDARY
}

/// Writes a [`Form`] as a multipart body.
pub struct MultipartEncoder<'a> {
    form: &'a mut Form,
    charset: Charset,
}

impl<'a> MultipartEncoder<'a> {
    /// Encoder over `form`, writing names and text with `charset`.
    pub fn new(form: &'a mut Form, charset: Charset) -> Self {
        Self { form, charset }
    }

    /// `multipart/form-data; boundary=...`
    pub fn content_type(&self) -> String {
        format!("{CONTENT_TYPE_MULTIPART}; boundary={}", boundary())
    }

    /// Exact body length, or `None` when a part's size is unknown.
    pub fn content_length(&self) -> Option<u64> {
        let mut total = 0u64;
        for field in self.form.fields() {
            total += self.part_header(&field.name, &field.value).len() as u64;
            total += match &field.value {
                FormValue::Text(text) => self.charset.encode(text).len() as u64,
                FormValue::Part(part) => part.payload.known_len()?,
            };
            total += 2;
        }
        Some(total + closing(boundary()).len() as u64)
    }

    /// Streams the whole body to `out` and flushes it.
    pub fn write_to<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        let charset = self.charset;
        for field in self.form.fields_mut() {
            let header = part_header(charset, &field.name, &field.value);
            out.write_all(&header)?;
            match &mut field.value {
                FormValue::Text(text) => out.write_all(&charset.encode(text))?,
                FormValue::Part(part) => match &mut part.payload {
                    PartPayload::Bytes(bytes) => out.write_all(bytes)?,
                    PartPayload::File(path) => {
                        let mut file = File::open(&*path)?;
                        copy_with_buffer(&mut file, out)?;
                    }
                    PartPayload::Reader(reader) => match reader.take() {
                        Some(mut reader) => {
                            copy_with_buffer(&mut reader, out)?;
                        }
                        None => warn!(
                            "Stream for multipart field '{}' was already consumed; sending it empty",
                            field.name
                        ),
                    },
                },
            }
            out.write_all(b"\r\n")?;
        }
        out.write_all(closing(boundary()).as_bytes())?;
        out.flush()
    }

    fn part_header(&self, name: &str, value: &FormValue) -> Vec<u8> {
        part_header(self.charset, name, value)
    }
}

fn part_header(charset: Charset, name: &str, value: &FormValue) -> Vec<u8> {
    let mut header = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"{}\"",
        boundary(),
        name
    );
    if let FormValue::Part(part) = value {
        if let Some(filename) = part.filename() {
            header.push_str("; filename=\"");
            header.push_str(filename);
            header.push('"');
        }
        header.push_str("\r\n");
        if let Some(content_type) = part.effective_content_type() {
            header.push_str("Content-Type: ");
            header.push_str(&content_type);
            header.push_str("\r\n");
        }
    } else {
        header.push_str("\r\n");
    }
    header.push_str("\r\n");
    charset.encode(&header).into_owned()
}

fn closing(boundary: &str) -> String {
    format!("--{boundary}--\r\n")
}

fn copy_with_buffer<R: Read + ?Sized, W: Write>(reader: &mut R, out: &mut W) -> io::Result<u64> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        out.write_all(&buf[..n])?;
        total += n as u64;
    }
}
