use flate2::read::GzDecoder;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::tempdir;

/// How to split a line into words
#[derive(Clone, Debug)]
pub enum Delimiter {
    Tab,
    Whitespace,
    Chars(Vec<char>),
}

impl From<char> for Delimiter {
    fn from(c: char) -> Self {
        if c == '\t' {
            Delimiter::Tab
        } else {
            Delimiter::Chars(vec![c])
        }
    }
}

impl Delimiter {
    /// Split `line` into owned words. Empty words are kept for
    /// `Tab` and `Chars` so that blank fields can be detected.
    pub fn split(&self, line: &str) -> Vec<Box<str>> {
        match self {
            Delimiter::Tab => line.split('\t').map(Box::from).collect(),
            Delimiter::Whitespace => line.split_whitespace().map(Box::from).collect(),
            Delimiter::Chars(chars) => line.split(chars.as_slice()).map(Box::from).collect(),
        }
    }
}

///
/// Read every line of the input_file into memory
///
/// * `input_file` - file name--either gzipped or not
///
pub fn read_lines(input_file_path: &str) -> anyhow::Result<Vec<Box<str>>> {
    let buf: Box<dyn BufRead> = open_buf_reader(input_file_path)?;
    let mut lines = vec![];
    for x in buf.lines() {
        lines.push(x?.into_boxed_str());
    }
    Ok(lines)
}

///
/// Write every line into the output_file
///
/// * `lines` - anything we can display line by line
/// * `output_file` - file name--either gzipped or not
///
pub fn write_lines<T>(lines: &[T], output_file_path: &str) -> anyhow::Result<()>
where
    T: std::fmt::Display,
{
    let mut buf = open_buf_writer(output_file_path)?;
    for line in lines {
        if let Err(e) = writeln!(buf, "{}", line) {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                return Ok(());
            } else {
                return Err(anyhow::anyhow!("unexpected error: {}", e));
            }
        }
    }
    buf.flush()?;
    Ok(())
}

/// Words of a delimited file
pub struct ReadLinesOut {
    /// (1-based line number in the file, words)
    pub lines: Vec<(usize, Vec<Box<str>>)>,
    pub header: Vec<Box<str>>,
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with('#') || line.starts_with('%')
}

///
/// Read lines of a delimited file, skipping comment lines (`#` or
/// `%`) and blank lines, and split each line into words.
///
/// * `input_file` - file name--either gzipped or not
/// * `delim` - delimiter
/// * `has_header` - treat the first non-comment line as a header
///
pub fn read_lines_of_words_delim(
    input_file: &str,
    delim: impl Into<Delimiter>,
    has_header: bool,
) -> anyhow::Result<ReadLinesOut> {
    let delim = delim.into();
    let buf_reader: Box<dyn BufRead> = open_buf_reader(input_file)?;

    let mut lines_raw: Vec<(usize, Box<str>)> = vec![];
    for (i, x) in buf_reader.lines().enumerate() {
        let x = x?;
        if is_comment_line(&x) || x.trim().is_empty() {
            continue;
        }
        lines_raw.push((i + 1, x.into_boxed_str()));
    }

    let mut header = vec![];
    let body = if has_header {
        let Some((_, hdr)) = lines_raw.first() else {
            return Err(anyhow::anyhow!("no header line in {}", input_file));
        };
        header.extend(delim.split(hdr));
        &lines_raw[1..]
    } else {
        &lines_raw[..]
    };

    // Parsing takes more time, so split them into parallel jobs
    let mut lines: Vec<(usize, Vec<Box<str>>)> = body
        .par_iter()
        .map(|(i, s)| (*i, delim.split(s)))
        .collect();

    lines.sort_by_key(|&(i, _)| i);

    Ok(ReadLinesOut { lines, header })
}

///
/// Open a file for reading, and return a buffered reader
/// * `input_file` - file name--either gzipped or not
pub fn open_buf_reader(input_file: &str) -> anyhow::Result<Box<dyn BufRead>> {
    let ext = Path::new(input_file).extension().and_then(|x| x.to_str());
    let file = File::open(input_file)
        .map_err(|e| anyhow::anyhow!("failed to open {}: {}", input_file, e))?;
    match ext {
        Some("gz") => Ok(Box::new(BufReader::new(GzDecoder::new(file)))),
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

///
/// Open a file for writing, and return a buffered writer
/// * `output_file` - file name--either gzipped or not
pub fn open_buf_writer(output_file: &str) -> anyhow::Result<Box<dyn std::io::Write>> {
    // we can simply override with stdout
    if output_file.eq_ignore_ascii_case("stdout") {
        return Ok(Box::new(std::io::BufWriter::new(std::io::stdout())));
    }

    if output_file.eq_ignore_ascii_case("stderr") {
        return Ok(Box::new(std::io::BufWriter::new(std::io::stderr())));
    }

    let ext = Path::new(output_file).extension().and_then(|x| x.to_str());
    let file = File::create(output_file)?;
    match ext {
        Some("gz") => {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            Ok(Box::new(BufWriter::new(encoder)))
        }
        _ => Ok(Box::new(BufWriter::new(file))),
    }
}

///
/// Create a directory if needed
/// * `file` - file name
///
pub fn mkdir(file: &str) -> anyhow::Result<()> {
    let path = Path::new(file);
    let dir = path.parent().ok_or(anyhow::anyhow!("no parent"))?;
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

///
/// Create a temporary directory and suggest a file name
/// * `suffix` - suffix of the file name
///
pub fn create_temp_dir_file(suffix: &str) -> anyhow::Result<std::path::PathBuf> {
    let temp_dir = tempdir()?.path().to_path_buf();
    std::fs::create_dir_all(&temp_dir)?;
    let temp_file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile_in(temp_dir)?
        .path()
        .to_owned();

    Ok(temp_file)
}

///
/// Remove a file if it exists
/// * `file` - file name
///
pub fn remove_file(file: &str) -> anyhow::Result<()> {
    let path = Path::new(file);
    if path.exists() {
        if path.is_file() {
            std::fs::remove_file(path)?;
        } else {
            std::fs::remove_dir_all(path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_split_keeps_blank_fields() {
        let words = Delimiter::Tab.split("a\t\tb");
        assert_eq!(words.len(), 3);
        assert!(words[1].is_empty());
    }

    #[test]
    fn read_words_skips_comments() -> anyhow::Result<()> {
        let file = create_temp_dir_file(".tsv.gz")?;
        let file = file.to_str().ok_or(anyhow::anyhow!("path"))?;
        let lines: Vec<Box<str>> = vec![
            "# comment".into(),
            "id\tname".into(),
            "1\tfoo".into(),
            "".into(),
            "2\tbar".into(),
        ];
        write_lines(&lines, file)?;

        let out = read_lines_of_words_delim(file, '\t', true)?;
        assert_eq!(out.header, vec![Box::from("id"), Box::from("name")]);
        assert_eq!(out.lines.len(), 2);
        assert_eq!(out.lines[0].0, 3);
        assert_eq!(out.lines[1].1[1].as_ref(), "bar");
        remove_file(file)?;
        Ok(())
    }
}
