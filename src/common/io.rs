//! Common, IO-related code.

use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use flate2::{bufread::MultiGzDecoder, write::GzEncoder, Compression};

/// Transparently open a file with gzip decoder.
pub fn open_read_maybe_gz<P>(path: P) -> Result<Box<dyn BufRead>, anyhow::Error>
where
    P: AsRef<Path>,
{
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        tracing::trace!("Opening {:?} as gzip for reading", path.as_ref());
        let file = File::open(path)?;
        let bufreader = BufReader::new(file);
        let decoder = MultiGzDecoder::new(bufreader);
        Ok(Box::new(BufReader::new(decoder)))
    } else {
        tracing::trace!("Opening {:?} as plain text for reading", path.as_ref());
        let file = File::open(path).map(BufReader::new)?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Transparently open afile with gzip encoder.
pub fn open_write_maybe_gz<P>(path: P) -> Result<Box<dyn Write>, anyhow::Error>
where
    P: AsRef<Path>,
{
    if path.as_ref().extension().map(|s| s.to_str()) == Some(Some("gz")) {
        tracing::trace!("Opening {:?} as gzip for writing", path.as_ref());
        let file = File::create(path)?;
        let bufwriter = BufWriter::new(file);
        let encoder = GzEncoder::new(bufwriter, Compression::default());
        Ok(Box::new(encoder))
    } else {
        tracing::trace!("Opening {:?} as plain text for writing", path.as_ref());
        let file = File::create(path)?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// Read JSON from a (maybe gzip-compressed) file.
pub fn read_json_maybe_gz<T, P>(path: P) -> Result<T, anyhow::Error>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let reader = open_read_maybe_gz(path.as_ref())?;
    serde_json::from_reader(reader)
        .map_err(|e| anyhow::anyhow!("problem parsing JSON from {:?}: {}", path.as_ref(), e))
}

/// Write pretty JSON to a (maybe gzip-compressed) file.
pub fn write_json_maybe_gz<T, P>(path: P, value: &T) -> Result<(), anyhow::Error>
where
    T: serde::Serialize,
    P: AsRef<Path>,
{
    let mut writer = open_write_maybe_gz(path.as_ref())?;
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| anyhow::anyhow!("problem writing JSON to {:?}: {}", path.as_ref(), e))?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};

    #[rstest::rstest]
    #[case(true)]
    #[case(false)]
    fn open_write_maybe_gz(#[case] is_gzip: bool) -> Result<(), anyhow::Error> {
        let filename = if is_gzip { "test.txt.gz" } else { "test.txt" };
        let tmp_dir = temp_testdir::TempDir::default();

        {
            let mut f = super::open_write_maybe_gz(tmp_dir.join(filename))?;
            f.write_all(b"hello")?;
            f.flush()?;
        }

        let mut f = std::fs::File::open(tmp_dir.join(filename)).map(std::io::BufReader::new)?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;

        if is_gzip {
            assert_eq!(&buf[..2], &[0x1f, 0x8b]);
        } else {
            assert_eq!(&buf, b"hello");
        }

        Ok(())
    }

    #[rstest::rstest]
    #[case("data.json")]
    #[case("data.json.gz")]
    fn json_maybe_gz_roundtrip(#[case] filename: &str) -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let value = indexmap::indexmap! {
            String::from("a") => vec![1, 2],
            String::from("b") => vec![3],
        };

        super::write_json_maybe_gz(tmp_dir.join(filename), &value)?;
        let read: indexmap::IndexMap<String, Vec<i32>> =
            super::read_json_maybe_gz(tmp_dir.join(filename))?;

        assert_eq!(read, value);

        Ok(())
    }

    #[test]
    fn read_json_missing_file() {
        assert!(super::read_json_maybe_gz::<serde_json::Value, _>("/does/not/exist.json").is_err());
    }
}
