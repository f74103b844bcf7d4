use std::{
    fs,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter, Serializer};

use crate::{
    db::constants::DATA_DIR,
    error::{Error, Result},
    model::ChartRecord,
};

/// Pretty printer that `\uXXXX`-escapes everything outside ASCII, so the
/// files survive transports that mangle encodings. Reading is unaffected.
struct AsciiPretty<'a>(PrettyFormatter<'a>);

impl Formatter for AsciiPretty<'_> {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut buf = [0u16; 2];
                for unit in ch.encode_utf16(&mut buf) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }

    fn begin_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_array(writer)
    }

    fn end_array<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_array(writer)
    }

    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_array_value(writer, first)
    }

    fn end_array_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_array_value(writer)
    }

    fn begin_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object(writer)
    }

    fn end_object<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object(writer)
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object_key(writer, first)
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.begin_object_value(writer)
    }

    fn end_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        self.0.end_object_value(writer)
    }
}

pub fn file_name(week_id: &str) -> String {
    format!("weekly_charts_{week_id}.json")
}

/// Serialize one week's records under `dir`. Overwrites any earlier file
/// for the same week.
pub fn write_to(dir: &Path, week_id: &str, records: &[ChartRecord]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(file_name(week_id));

    let mut writer = BufWriter::new(fs::File::create(&path)?);
    let mut ser =
        Serializer::with_formatter(&mut writer, AsciiPretty(PrettyFormatter::with_indent(b"  ")));
    records.serialize(&mut ser)?;
    writer.flush()?;

    Ok(path)
}

pub fn write(week_id: &str, records: &[ChartRecord]) -> Result<PathBuf> {
    write_to(Path::new(DATA_DIR), week_id, records)
}

pub fn read(path: &Path) -> Result<Vec<ChartRecord>> {
    if !path.exists() {
        return Err(Error::SnapshotNotFound(path.to_owned()));
    }
    let reader = BufReader::new(fs::File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Snapshot files under `dir`, filename-sorted. Missing directory reads
/// as empty, not as an error.
pub fn list_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with("weekly_charts_") && name.ends_with(".json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn list_all() -> Result<Vec<PathBuf>> {
    list_in(Path::new(DATA_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(track_id: &str, track_name: &str, artist: &str) -> ChartRecord {
        ChartRecord {
            week_id: "2024-05-02".to_owned(),
            country: "JP".to_owned(),
            rank: 1,
            streams: 123,
            track_id: track_id.to_owned(),
            track_name: track_name.to_owned(),
            artist_names: vec![artist.to_owned()],
        }
    }

    #[test]
    fn output_is_ascii_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record("abc", "アイドル", "YOASOBI"),
            record("def", "Beyonc\u{e9}", "Beyonc\u{e9}"),
            record("ghi", "emoji \u{1f3b5}", "Nobody"),
        ];

        let path = write_to(dir.path(), "2024-05-02", &records).unwrap();
        assert_eq!(path.file_name().unwrap(), "weekly_charts_2024-05-02.json");

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.is_ascii(), "non-ASCII byte leaked into {text}");
        assert!(text.contains("\\u30a2"));
        assert!(text.contains("Beyonc\\u00e9"));
        // astral chars become surrogate pairs
        assert!(text.contains("\\ud83c\\udfb5"));

        assert_eq!(read(&path).unwrap(), records);
    }

    #[test]
    fn list_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_to(dir.path(), "2024-05-09", &[record("a", "A", "A")]).unwrap();
        write_to(dir.path(), "2024-05-02", &[record("b", "B", "B")]).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let names: Vec<_> = list_in(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["weekly_charts_2024-05-02.json", "weekly_charts_2024-05-09.json"]);
    }

    #[test]
    fn missing_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("weekly_charts_1999-01-07.json");
        assert!(matches!(read(&missing), Err(Error::SnapshotNotFound(_))));
    }

    #[test]
    fn missing_dir_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(list_in(&gone).unwrap().is_empty());
    }
}
