//! Decode every document under `tests/fixtures/decoding` and compare the result
//! with the companion `.txt` file, with the default buffers and with randomly
//! shrunk ones.

use std::{
    fs::{File, read_to_string},
    io::{Cursor, Read},
    path::{Path, PathBuf},
};

use exent::{
    encoding::{XmlCharChunk, XmlCharEncoding, XmlStreamDecoder, new_decoder},
    globals::{set_default_chunk_size, set_default_raw_buffer_size},
    io::XmlInputSource,
    reader::XmlReaderFactory,
};
use rand::Rng;

fn fixtures() -> Vec<PathBuf> {
    let pattern = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/decoding/*.xml");
    let files = glob::glob(pattern)
        .expect("invalid glob pattern")
        .collect::<Result<Vec<_>, _>>()
        .expect("unreadable fixture");
    assert!(!files.is_empty(), "no fixture found");
    files
}

fn decode_file(path: &Path) -> (String, String, usize) {
    let mut factory = XmlReaderFactory::new();
    let source = XmlInputSource::from_reader(File::open(path).unwrap());
    let mut reader = factory
        .create_reader(source, path.to_str(), true)
        .unwrap_or_else(|e| panic!("{}: {e}", path.display()));
    let text = reader.read_to_string();
    let diagnostics = reader.take_diagnostics().len();
    (reader.encoding_name().to_owned(), text, diagnostics)
}

fn expected(path: &Path) -> String {
    read_to_string(path.with_extension("txt")).unwrap()
}

#[test]
fn decode_fixtures() {
    for path in fixtures() {
        let (encoding, text, diagnostics) = decode_file(&path);
        assert_eq!(text, expected(&path), "{} ({encoding})", path.display());
        assert_eq!(diagnostics, 0, "{}", path.display());
    }
}

#[test]
fn detected_encodings() {
    let cases = [
        ("utf8.xml", "UTF-8"),
        ("nodecl.xml", "UTF-8"),
        ("latin1.xml", "ISO-8859-1"),
        ("latin2.xml", "ISO-8859-2"),
        ("utf16le-bom.xml", "UTF-16"),
        ("utf16be.xml", "UTF-16BE"),
        ("ebcdic.xml", "EBCDIC-CP-US"),
        ("shift-jis.xml", "SHIFT_JIS"),
    ];
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/decoding");
    for (file, encoding) in cases {
        let (detected, _, _) = decode_file(&dir.join(file));
        assert_eq!(detected, encoding, "{file}");
    }
}

#[test]
fn boundary_independence() {
    let mut rng = rand::rng();
    for path in fixtures() {
        let expected = expected(&path);
        for _ in 0..20 {
            set_default_raw_buffer_size(rng.random_range(8..40));
            set_default_chunk_size(rng.random_range(1..24));
            let (encoding, text, diagnostics) = decode_file(&path);
            assert_eq!(text, expected, "{} ({encoding})", path.display());
            assert_eq!(diagnostics, 0);
        }
    }
}

/// A reader returning the bytes in the given slices, one slice per read.
struct Splits {
    data: Vec<u8>,
    cuts: Vec<usize>,
    pos: usize,
}

impl Read for Splits {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let end = self
            .cuts
            .iter()
            .copied()
            .find(|&cut| cut > self.pos)
            .unwrap_or(self.data.len())
            .min(self.pos + buf.len());
        let len = end - self.pos;
        buf[..len].copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(len)
    }
}

fn decode_with_cuts(data: &[u8], cuts: Vec<usize>, chunk: usize) -> Vec<u16> {
    let source = Splits {
        data: data.to_vec(),
        cuts,
        pos: 0,
    };
    let mut decoder = new_decoder(XmlCharEncoding::UTF8, Box::new(source));
    let mut chunk_buf = XmlCharChunk::new();
    let mut out = vec![];
    while !chunk_buf.is_terminated() {
        decoder.refill(&mut chunk_buf, chunk).unwrap();
        out.extend_from_slice(chunk_buf.units());
    }
    out
}

#[test]
fn line_ends_at_every_split() {
    let data = b"A\r\nB\rC\nD";
    let expected = "A\nB\nC\nD".encode_utf16().collect::<Vec<_>>();
    for cut in 0..=data.len() {
        for chunk in 1..6 {
            assert_eq!(decode_with_cuts(data, vec![cut], chunk), expected, "cut {cut}");
        }
    }
}

#[test]
fn supplementary_characters_at_random_splits() {
    let text = "x\u{10000}y\u{1F600}\u{10FFFF}z\r\n\u{E9}";
    let expected = text.replace("\r\n", "\n").encode_utf16().collect::<Vec<_>>();
    let data = text.as_bytes();
    let mut rng = rand::rng();
    for _ in 0..200 {
        let mut cuts = (0..rng.random_range(0..6))
            .map(|_| rng.random_range(0..data.len()))
            .collect::<Vec<_>>();
        cuts.sort_unstable();
        let chunk = rng.random_range(1..8);
        assert_eq!(
            decode_with_cuts(data, cuts.clone(), chunk),
            expected,
            "cuts {cuts:?}, chunk {chunk}"
        );
    }
}

#[test]
fn char_stream_source() {
    let mut factory = XmlReaderFactory::new();
    let chars = "a\rb".chars().collect::<Vec<_>>();
    let mut reader = factory
        .create_reader(XmlInputSource::from_chars(chars.into_iter()), None, true)
        .unwrap();
    assert_eq!(reader.read_to_string(), "a\nb");

    let bytes = Cursor::new(vec![0xFF, 0xFE, b'a', 0]);
    let source = XmlInputSource::from_reader(bytes).with_encoding("UTF-16");
    let mut reader = factory.create_reader(source, None, false).unwrap();
    assert_eq!(reader.read_to_string(), "a");
}
