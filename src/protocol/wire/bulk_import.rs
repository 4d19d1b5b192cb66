use std::{collections::BTreeMap, fmt, mem, path::Path};

use bytes::Bytes;
use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use reqwest::Body;
use tracing::{Level, event};

use crate::{Error, LoadProgress, connection::Session};

/// Size the serialized rows are gathered to before they become a chunk of
/// the upload body.
const CHUNK_BYTES: usize = 64 * 1024;

/// How rows of a bulk load upload end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordDelimiter {
    /// `\n`
    #[default]
    Newline,
    /// `\r\n`
    CrLf,
    /// Any other single byte.
    Byte(u8),
}

impl RecordDelimiter {
    fn terminator(self) -> Terminator {
        match self {
            RecordDelimiter::Newline => Terminator::Any(b'\n'),
            RecordDelimiter::CrLf => Terminator::CRLF,
            RecordDelimiter::Byte(b) => Terminator::Any(b),
        }
    }

    fn header_value(self) -> String {
        match self {
            RecordDelimiter::Newline => escape(b'\n'),
            RecordDelimiter::CrLf => "\\r\\n".to_string(),
            RecordDelimiter::Byte(b) => escape(b),
        }
    }
}

/// The CSV dialect of a bulk load upload.
///
/// Fields are separated by `field_delimiter` and rows end with
/// `record_delimiter`. A field is wrapped in `quote` only when it contains
/// the field delimiter, the quote or the record delimiter, with embedded
/// quotes doubled. Both newline delimiters also quote fields holding `\r`
/// or `\n`. A row consisting of a single empty field is
/// written as `""` so that it is not mistaken for an empty line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFormat {
    pub field_delimiter: u8,
    pub record_delimiter: RecordDelimiter,
    pub quote: u8,
}

impl Default for LoadFormat {
    fn default() -> Self {
        Self {
            field_delimiter: b',',
            record_delimiter: RecordDelimiter::Newline,
            quote: b'"',
        }
    }
}

impl LoadFormat {
    /// The format options sent to the server as request headers.
    pub(crate) fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("format_type", "CSV".to_string()),
            ("field_delimiter", escape(self.field_delimiter)),
            ("record_delimiter", self.record_delimiter.header_value()),
            ("quote", escape(self.quote)),
            ("skip_header", "0".to_string()),
        ]
    }

    /// A CSV writer producing this dialect into memory.
    pub(crate) fn writer(&self) -> Writer<Vec<u8>> {
        WriterBuilder::new()
            .delimiter(self.field_delimiter)
            .quote(self.quote)
            .terminator(self.record_delimiter.terminator())
            .quote_style(QuoteStyle::Necessary)
            .flexible(true)
            .from_writer(Vec::new())
    }
}

/// Control characters cannot travel in a header value, so they are sent in
/// their backslash form.
fn escape(b: u8) -> String {
    match b {
        b'\n' => "\\n".to_string(),
        b'\r' => "\\r".to_string(),
        b'\t' => "\\t".to_string(),
        b => char::from(b).to_string(),
    }
}

/// A handler for a bulk load data flow.
///
/// Rows are validated and serialized as they are sent, then uploaded as one
/// streaming request body by [`finalize`](Self::finalize). Any row whose
/// field count differs from the expected width fails the whole load before a
/// single byte goes over the wire.
///
/// The expected width is either set up front with
/// [`with_columns`](Self::with_columns) or taken from the first row.
pub struct BulkLoad<'a> {
    session: &'a Session,
    sql: String,
    format: LoadFormat,
    writer: Writer<Vec<u8>>,
    buffered: usize,
    chunks: Vec<Bytes>,
    columns: Option<usize>,
    rows: u64,
    size: u64,
    failed: Option<Error>,
}

impl fmt::Debug for BulkLoad<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkLoad")
            .field("sql", &self.sql)
            .field("format", &self.format)
            .field("columns", &self.columns)
            .field("rows", &self.rows)
            .field("size", &self.size)
            .field("failed", &self.failed)
            .finish()
    }
}

impl<'a> BulkLoad<'a> {
    pub(crate) fn new(session: &'a Session, sql: impl Into<String>) -> Self {
        let format = LoadFormat::default();

        Self {
            session,
            sql: sql.into(),
            writer: format.writer(),
            format,
            buffered: 0,
            chunks: Vec::new(),
            columns: None,
            rows: 0,
            size: 0,
            failed: None,
        }
    }

    /// Fixes the number of fields every row must have.
    pub fn with_columns(mut self, columns: usize) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Replaces the default CSV dialect.
    ///
    /// The whole upload shares one dialect, so changing it after a row was
    /// sent poisons the load.
    pub fn with_format(mut self, format: LoadFormat) -> Self {
        if self.rows > 0 {
            self.failed.get_or_insert(Error::InvalidArgument(
                "the load format cannot change once rows were sent".into(),
            ));
            return self;
        }

        self.writer = format.writer();
        self.format = format;
        self
    }

    /// The number of rows accepted so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// The size of the serialized upload body so far.
    pub fn upload_bytes(&self) -> u64 {
        self.size
    }

    /// Adds a row of raw field values to the load.
    ///
    /// Once a row is rejected the load is poisoned: further rows are refused
    /// and [`finalize`](Self::finalize) returns the same error without
    /// uploading anything.
    pub fn send<I, S>(&mut self, row: I) -> crate::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        let fields: Vec<S> = row.into_iter().collect();
        let expected = *self.columns.get_or_insert(fields.len());

        if fields.len() != expected || expected == 0 {
            let err = Error::SchemaMismatch {
                row_index: self.rows as usize,
                expected,
                found: fields.len(),
            };
            self.failed = Some(err.clone());
            return Err(err);
        }

        if let Err(err) = self.write_record(&fields) {
            self.failed = Some(err.clone());
            return Err(err);
        }

        self.rows += 1;
        Ok(())
    }

    fn write_record<S: AsRef<str>>(&mut self, fields: &[S]) -> crate::Result<()> {
        self.writer
            .write_record(fields.iter().map(|f| f.as_ref().as_bytes()))?;
        self.writer.flush().map_err(csv::Error::from)?;

        let len = self.writer.get_ref().len();
        self.size += (len - self.buffered) as u64;
        self.buffered = len;

        if self.buffered >= CHUNK_BYTES {
            self.seal()?;
        }

        Ok(())
    }

    /// Moves everything written so far into a chunk of the upload body.
    fn seal(&mut self) -> crate::Result<()> {
        let writer = mem::replace(&mut self.writer, self.format.writer());
        let buf = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;

        if !buf.is_empty() {
            self.chunks.push(Bytes::from(buf));
        }

        self.buffered = 0;
        Ok(())
    }

    /// Uploads the serialized rows and waits for the server to acknowledge
    /// the load.
    ///
    /// A load without rows completes immediately without contacting the
    /// server.
    pub async fn finalize(mut self) -> crate::Result<LoadProgress> {
        if let Some(err) = self.failed {
            return Err(err);
        }

        if self.rows == 0 {
            return Ok(LoadProgress::default());
        }

        self.seal()?;

        event!(
            Level::DEBUG,
            "Finalizing a bulk load ({} rows, {} bytes in {} chunks)",
            self.rows,
            self.size,
            self.chunks.len(),
        );

        let headers = self
            .format
            .headers()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();

        let stream = futures_util::stream::iter(self.chunks.into_iter().map(Ok::<_, std::io::Error>));
        let resp = self
            .session
            .streaming_load(&self.sql, headers, Body::wrap_stream(stream), self.size, "upload.csv")
            .await?;

        if let Some(err) = resp.error {
            return Err(err.into());
        }

        if resp.stats.rows != self.rows {
            return Err(Error::protocol(format!(
                "server acknowledged {} rows of a {} row load",
                resp.stats.rows, self.rows
            )));
        }

        Ok(LoadProgress {
            write_rows: resp.stats.rows,
            write_bytes: resp.stats.bytes,
        })
    }
}

/// The format headers of a file upload.
///
/// `format_type` comes from the file extension unless the options name one.
/// A CSV upload gets the default dialect for every option it leaves out.
pub(crate) fn file_headers(
    path: &Path,
    options: &BTreeMap<&str, &str>,
) -> crate::Result<Vec<(String, String)>> {
    let mut headers: BTreeMap<String, String> = options
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    if !headers.contains_key("format_type") {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .ok_or_else(|| {
                Error::InvalidArgument(
                    format!("cannot tell the format of {} from its extension", path.display()).into(),
                )
            })?;

        headers.insert("format_type".to_string(), extension.to_ascii_uppercase());
    }

    let is_csv = headers
        .get("format_type")
        .is_some_and(|format| format.eq_ignore_ascii_case("csv"));

    if is_csv {
        for (name, value) in LoadFormat::default().headers() {
            headers.entry(name.to_string()).or_insert(value);
        }
    }

    Ok(headers.into_iter().collect())
}

/// Uploads a local file into the table of `sql`.
pub(crate) async fn load_file(
    session: &Session,
    sql: &str,
    path: &Path,
    options: &BTreeMap<&str, &str>,
) -> crate::Result<LoadProgress> {
    let headers = file_headers(path, options)?;

    let unreadable = |e: std::io::Error| {
        Error::InvalidArgument(format!("cannot read {}: {}", path.display(), e).into())
    };

    let file = tokio::fs::File::open(path).await.map_err(unreadable)?;
    let size = file.metadata().await.map_err(unreadable)?.len();

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    event!(Level::DEBUG, "Loading file {} ({} bytes)", path.display(), size);

    let resp = session
        .streaming_load(sql, headers, Body::from(file), size, &file_name)
        .await?;

    if let Some(err) = resp.error {
        return Err(err.into());
    }

    Ok(LoadProgress {
        write_rows: resp.stats.rows,
        write_bytes: resp.stats.bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_with(format: &LoadFormat, rows: &[&[&str]]) -> String {
        let mut writer = format.writer();
        for row in rows {
            writer.write_record(*row).unwrap();
        }
        writer.flush().unwrap();
        String::from_utf8(writer.get_ref().clone()).unwrap()
    }

    fn encode(fields: &[&str]) -> String {
        encode_with(&LoadFormat::default(), &[fields])
    }

    #[test]
    fn plain_fields_are_not_quoted() {
        assert_eq!(
            "-1,1,1.0,1,1,2011-03-06,2011-03-06T06:20:00Z\n",
            encode(&["-1", "1", "1.0", "1", "1", "2011-03-06", "2011-03-06T06:20:00Z"])
        );
    }

    #[test]
    fn serialized_size_differs_from_raw_length() {
        let row = ["-1", "1", "1.0", "1", "1", "2011-03-06", "2011-03-06T06:20:00Z"];
        let raw: usize = row.iter().map(|f| f.len()).sum();
        // one delimiter per field boundary plus the record delimiter
        assert_eq!(raw + row.len(), encode(&row).len());
    }

    #[test]
    fn special_fields_are_quoted() {
        assert_eq!("\"a,b\",x\n", encode(&["a,b", "x"]));
        assert_eq!("\"say \"\"hi\"\"\"\n", encode(&["say \"hi\""]));
        assert_eq!("\"two\nlines\",\n", encode(&["two\nlines", ""]));
        assert_eq!("\"\"\n", encode(&[""]));
    }

    #[test]
    fn custom_delimiter() {
        let format = LoadFormat {
            field_delimiter: b'\t',
            record_delimiter: RecordDelimiter::CrLf,
            quote: b'\'',
        };
        assert_eq!("a,b\t'it''s'\r\n", encode_with(&format, &[&["a,b", "it's"]]));
    }

    #[test]
    fn fields_holding_the_record_delimiter_are_quoted() {
        let format = LoadFormat {
            record_delimiter: RecordDelimiter::Byte(b';'),
            ..LoadFormat::default()
        };
        assert_eq!("\"a;b\",c;", encode_with(&format, &[&["a;b", "c"]]));
        assert_eq!("x,y;1,2;", encode_with(&format, &[&["x", "y"], &["1", "2"]]));
    }

    #[test]
    fn format_headers() {
        let headers = LoadFormat::default().headers();
        assert!(headers.contains(&("format_type", "CSV".to_string())));
        assert!(headers.contains(&("field_delimiter", ",".to_string())));
        assert!(headers.contains(&("record_delimiter", "\\n".to_string())));
        assert!(headers.contains(&("skip_header", "0".to_string())));
    }

    #[test]
    fn control_characters_are_escaped_in_headers() {
        let format = LoadFormat {
            field_delimiter: b'\t',
            record_delimiter: RecordDelimiter::CrLf,
            quote: b'\'',
        };
        let headers = format.headers();
        assert!(headers.contains(&("field_delimiter", "\\t".to_string())));
        assert!(headers.contains(&("record_delimiter", "\\r\\n".to_string())));
        assert!(headers.contains(&("quote", "'".to_string())));

        let format = LoadFormat {
            record_delimiter: RecordDelimiter::Byte(b'|'),
            ..LoadFormat::default()
        };
        assert!(format.headers().contains(&("record_delimiter", "|".to_string())));
    }

    #[test]
    fn file_format_from_extension() {
        let headers = file_headers(Path::new("/tmp/books.csv"), &BTreeMap::new()).unwrap();
        assert!(headers.contains(&("format_type".to_string(), "CSV".to_string())));
        assert!(headers.contains(&("field_delimiter".to_string(), ",".to_string())));

        let headers = file_headers(Path::new("/tmp/books.parquet"), &BTreeMap::new()).unwrap();
        assert_eq!(vec![("format_type".to_string(), "PARQUET".to_string())], headers);
    }

    #[test]
    fn file_options_take_precedence() {
        let options = BTreeMap::from([("field_delimiter", "|"), ("skip_header", "1")]);
        let headers = file_headers(Path::new("books.csv"), &options).unwrap();
        assert!(headers.contains(&("field_delimiter".to_string(), "|".to_string())));
        assert!(headers.contains(&("skip_header".to_string(), "1".to_string())));

        let options = BTreeMap::from([("format_type", "NDJSON")]);
        let headers = file_headers(Path::new("books"), &options).unwrap();
        assert_eq!(vec![("format_type".to_string(), "NDJSON".to_string())], headers);
    }

    #[test]
    fn file_without_extension_needs_a_format() {
        let err = file_headers(Path::new("/tmp/books"), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
