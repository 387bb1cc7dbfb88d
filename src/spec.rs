//! Collection-specification assembly.
//!
//! A spec document is a text template with two sentinel marker lines; the
//! harness re-emits the template's header and trailer byte-for-byte and
//! splices enabled-artifact blocks between them. Templates in the wild are
//! frequently UTF-16 (exported from Windows tooling), so decoding tries
//! UTF-16 first and remembers the winning encoding for the write side.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use widestring::U16String;

use crate::constants::{CLIENT_INFO_ARTIFACT, SPEC_END_MARKER, SPEC_START_MARKER};
use crate::utils::fs::ensure_dir;

/// Text encoding a template was successfully decoded with.
///
/// Tried in declaration order. Latin-1 accepts any byte sequence, so ASCII
/// is only reachable in principle; it is kept to make the fallback list
/// explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateEncoding {
    Utf16Le,
    Utf16Be,
    Utf8,
    Latin1,
    Ascii,
}

/// Builds spec documents from a template and artifact names.
pub struct SpecAssembler {
    template_path: PathBuf,
    output_dir: PathBuf,
}

impl SpecAssembler {
    pub fn new(template_path: &Path, output_dir: &Path) -> Self {
        Self {
            template_path: template_path.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Create a spec enabling a single artifact.
    ///
    /// The output filename encodes the artifact name with dots replaced by
    /// underscores.
    pub fn create_spec(&self, artifact: &str) -> Result<PathBuf> {
        let filename = format!(
            "single_artifact_spec_{}.yaml",
            artifact.replace('.', "_")
        );
        self.generate(&[artifact], &filename)
    }

    /// Create one spec enabling several artifacts, so a single collector
    /// run covers them all.
    pub fn create_combined_spec(&self, artifacts: &[String], spec_name: &str) -> Result<PathBuf> {
        let names: Vec<&str> = artifacts.iter().map(String::as_str).collect();
        self.generate(&names, &format!("{}.yaml", spec_name))
    }

    fn generate(&self, artifacts: &[&str], filename: &str) -> Result<PathBuf> {
        ensure_dir(&self.output_dir)?;

        let bytes = fs::read(&self.template_path).context(format!(
            "Failed to read spec template {}",
            self.template_path.display()
        ))?;
        let (lines, encoding) = decode_template(&bytes).context(format!(
            "Failed to decode spec template {}",
            self.template_path.display()
        ))?;
        debug!(
            "Decoded template {} as {:?} ({} lines)",
            self.template_path.display(),
            encoding,
            lines.len()
        );

        let (start, end) = find_markers(&lines)?;

        // Header keeps the marker line and the "Artifacts:" line after it.
        let eol = line_ending(&lines);
        let mut content = String::new();
        for line in &lines[..start + 2] {
            content.push_str(line);
        }
        for artifact in artifacts {
            content.push_str(&format!(" {}:{eol}    All: Y{eol}", artifact));
        }
        content.push_str(&format!(" {CLIENT_INFO_ARTIFACT}:{eol}    All: Y{eol}"));
        for line in &lines[end..] {
            content.push_str(line);
        }

        let spec_path = self.output_dir.join(filename);
        let encoded = encode_text(&content, encoding)?;
        fs::write(&spec_path, encoded)
            .context(format!("Failed to write spec file {}", spec_path.display()))?;

        info!(
            "Created spec {} ({} artifact(s))",
            spec_path.display(),
            artifacts.len()
        );
        Ok(spec_path)
    }
}

/// Locate the start and end marker lines.
///
/// Both markers are searched for independently (first occurrence each), so
/// an end marker that precedes the start marker is reported as out of
/// order rather than hiding the start marker.
pub fn find_markers(lines: &[String]) -> Result<(usize, usize)> {
    let mut start = None;
    let mut end = None;

    for (i, line) in lines.iter().enumerate() {
        if start.is_none() && line.contains(SPEC_START_MARKER) {
            start = Some(i);
        } else if end.is_none() && line.contains(SPEC_END_MARKER) {
            end = Some(i);
        }
        if start.is_some() && end.is_some() {
            break;
        }
    }

    match (start, end) {
        (Some(s), Some(e)) if e > s => Ok((s, e)),
        (Some(s), Some(e)) => Err(anyhow!(
            "Spec template markers out of order: end marker at line {} precedes start marker at line {}",
            e,
            s
        )),
        _ => Err(anyhow!(
            "Spec template markers not found (need both \"{}\" and \"{}\")",
            SPEC_START_MARKER,
            SPEC_END_MARKER
        )),
    }
}

/// Decode template bytes, trying UTF-16 first, then the single-byte list.
///
/// Returns the template split into lines with their terminators preserved,
/// plus the encoding that succeeded so the writer can round-trip it.
pub fn decode_template(bytes: &[u8]) -> Result<(Vec<String>, TemplateEncoding)> {
    if let Some((text, encoding)) = try_utf16(bytes) {
        return Ok((split_lines(&text), encoding));
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok((split_lines(text), TemplateEncoding::Utf8));
    }
    // Latin-1 maps every byte to its codepoint, so this cannot fail.
    let text: String = bytes.iter().map(|&b| b as char).collect();
    Ok((split_lines(&text), TemplateEncoding::Latin1))
}

/// Encode text back into the template's original encoding.
pub fn encode_text(text: &str, encoding: TemplateEncoding) -> Result<Vec<u8>> {
    match encoding {
        TemplateEncoding::Utf16Le => {
            let wide = U16String::from_str(text);
            let mut bytes = Vec::with_capacity(2 + wide.len() * 2);
            bytes.extend_from_slice(&[0xFF, 0xFE]);
            for unit in wide.as_slice() {
                bytes.extend_from_slice(&unit.to_le_bytes());
            }
            Ok(bytes)
        }
        TemplateEncoding::Utf16Be => {
            let wide = U16String::from_str(text);
            let mut bytes = Vec::with_capacity(2 + wide.len() * 2);
            bytes.extend_from_slice(&[0xFE, 0xFF]);
            for unit in wide.as_slice() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            Ok(bytes)
        }
        TemplateEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        TemplateEncoding::Latin1 | TemplateEncoding::Ascii => text
            .chars()
            .map(|c| {
                let code = c as u32;
                if code <= 0xFF {
                    Ok(code as u8)
                } else {
                    Err(anyhow!("Character {:?} not representable in Latin-1", c))
                }
            })
            .collect(),
    }
}

/// Decode BOM-led UTF-16; returns None when there is no BOM or the payload
/// is malformed, so the caller falls through to single-byte encodings.
fn try_utf16(bytes: &[u8]) -> Option<(String, TemplateEncoding)> {
    if bytes.len() < 2 || bytes.len() % 2 != 0 {
        return None;
    }
    let (encoding, payload) = match (bytes[0], bytes[1]) {
        (0xFF, 0xFE) => (TemplateEncoding::Utf16Le, &bytes[2..]),
        (0xFE, 0xFF) => (TemplateEncoding::Utf16Be, &bytes[2..]),
        _ => return None,
    };

    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| match encoding {
            TemplateEncoding::Utf16Le => u16::from_le_bytes([pair[0], pair[1]]),
            _ => u16::from_be_bytes([pair[0], pair[1]]),
        })
        .collect();

    U16String::from_vec(units)
        .to_string()
        .ok()
        .map(|text| (text, encoding))
}

/// Split text into lines keeping each line's terminator attached.
fn split_lines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

/// Line ending used by the template, judged from its first line.
fn line_ending(lines: &[String]) -> &'static str {
    match lines.first() {
        Some(line) if line.ends_with("\r\n") => "\r\n",
        _ => "\n",
    }
}
