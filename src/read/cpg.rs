/// Reads ".cpg" files: a one-line hint naming the ".dbf" character set.
///
/// Producers write either a WHATWG-style label ("UTF-8", "ISO-8859-1") or
/// a bare Windows code page number ("1252").
use std::fmt;
use encoding::EncodingRef;
use encoding::label::encoding_from_whatwg_label;

const UTF_8_CODE_PAGE: &str = "65001";

pub struct Cpg {
    /// The canonical WHATWG name of the character set.
    pub charset: String,
    pub encoding: EncodingRef,
}

// encoding::EncodingRef does not implement std::fmt::Debug
impl fmt::Debug for Cpg {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Cpg")
            .field("charset", &self.charset)
            .finish()
    }
}

fn lookup(label: &str) -> Option<EncodingRef> {
    if label == UTF_8_CODE_PAGE {
        return encoding_from_whatwg_label("utf-8");
    }
    if !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit()) {
        return encoding_from_whatwg_label(&format!("windows-{}", label));
    }
    encoding_from_whatwg_label(label)
}

/// Parses the contents of a ".cpg" file.
///
/// On failure, returns a description of the problem.
pub fn parse_cpg(buf: &[u8]) -> Result<Cpg, String> {
    let text = String::from_utf8_lossy(buf);
    let label = text.trim().to_lowercase();
    match lookup(&label) {
        Some(encoding) => {
            let charset = encoding.whatwg_name().unwrap_or(encoding.name()).to_string();
            debug!("cpg: {:?} is {}", label, charset);
            Ok(Cpg {
                charset: charset,
                encoding: encoding,
            })
        }
        None => Err(format!("{:?}: unknown character set", text.trim())),
    }
}
