use serde::Serialize;

/// A printable run found in a buffer, with its byte offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringHit {
    pub offset: usize,
    pub text: String,
}

fn is_printable(b: u8) -> bool {
    (0x20..=0x7e).contains(&b) || b == b'\t'
}

/// Printable ASCII runs of at least `min_len` bytes, like `strings -t x -n <min_len>`.
pub fn extract_strings(bytes: &[u8], min_len: usize) -> Vec<StringHit> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut len = 0usize;

    for (i, &b) in bytes.iter().enumerate() {
        if is_printable(b) {
            if len == 0 {
                start = i;
            }
            len += 1;
        } else {
            if len >= min_len {
                out.push(StringHit {
                    offset: start,
                    text: String::from_utf8_lossy(&bytes[start..start + len]).into_owned(),
                });
            }
            len = 0;
        }
    }

    if len >= min_len {
        out.push(StringHit {
            offset: start,
            text: String::from_utf8_lossy(&bytes[start..start + len]).into_owned(),
        });
    }

    out
}

/// True when the last whitespace-separated token ends with one of `extensions`.
pub fn trailing_token_matches(text: &str, extensions: &[String]) -> bool {
    let Some(token) = text.split_whitespace().next_back() else {
        return false;
    };
    extensions.iter().any(|ext| token.ends_with(ext.as_str()))
}

/// Strings whose trailing token carries one of `extensions`, in file order.
pub fn resource_hits(bytes: &[u8], min_len: usize, extensions: &[String]) -> Vec<StringHit> {
    extract_strings(bytes, min_len)
        .into_iter()
        .filter(|hit| trailing_token_matches(&hit.text, extensions))
        .collect()
}
