// 画像XObject辞書の探索: `<<` ... `>>` stream の範囲を有限窓で列挙する

use super::find_bytes;

/// 画像XObject辞書として扱うために含まれていなければならないトークン。
pub const IMAGE_MARKERS: &[&[u8]] = &[b"/Subtype", b"/Image"];

/// ストリームを伴う辞書1件分。
///
/// `dict` は `<<` と `>>` の間のバイト列（区切り自体は含まない）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDictionary<'a> {
    pub dict: &'a [u8],
    /// 文書先頭から `<<` までのオフセット。
    pub offset: usize,
    /// `stream` キーワードと改行の直後、ストリーム先頭バイトのオフセット。
    pub stream_start: usize,
}

impl<'a> StreamDictionary<'a> {
    /// 辞書内にバイト列が含まれるか。
    pub fn contains(&self, needle: &[u8]) -> bool {
        find_bytes(self.dict, needle).is_some()
    }

    /// キーの直後にある整数リテラルを返す。
    ///
    /// `/Length 42 0 R` のような間接参照は解決せず `None` を返す。
    pub fn inline_integer(&self, key: &[u8]) -> Option<u64> {
        let (value, rest) = self.integer_value(key)?;
        if is_indirect_reference_tail(rest) {
            return None;
        }
        Some(value)
    }

    /// キーの直後にある整数を返す（間接参照かどうかは区別しない）。
    pub fn integer(&self, key: &[u8]) -> Option<u64> {
        self.integer_value(key).map(|(value, _)| value)
    }

    /// キーが辞書に現れるか。
    pub fn has_key(&self, key: &[u8]) -> bool {
        key_positions(self.dict, key).next().is_some()
    }

    /// 整数値と、その直後の残りバイト列を返す。
    fn integer_value(&self, key: &[u8]) -> Option<(u64, &'a [u8])> {
        let dict = self.dict;
        key_positions(dict, key).find_map(move |value_pos| parse_integer(&dict[value_pos..]))
    }
}

/// 辞書中でキーとして現れる位置（キー直後のオフセット）を列挙する。
///
/// `/Width` が `/WidthScale` のような別キーの先頭部分に一致した場合は除外する。
fn key_positions<'d>(dict: &'d [u8], key: &'d [u8]) -> impl Iterator<Item = usize> + 'd {
    let mut from = 0;
    std::iter::from_fn(move || {
        while from < dict.len() {
            let idx = find_bytes(&dict[from..], key)? + from;
            let end = idx + key.len();
            from = idx + 1;
            if dict.get(end).is_none_or(|&b| !is_regular(b)) {
                return Some(end);
            }
        }
        None
    })
}

/// 先頭の空白を読み飛ばして10進整数を読む。桁あふれは `None`。
fn parse_integer(bytes: &[u8]) -> Option<(u64, &[u8])> {
    let bytes = skip_whitespace(bytes);
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    let mut value: u64 = 0;
    for &b in &bytes[..digits] {
        value = value.checked_mul(10)?.checked_add(u64::from(b - b'0'))?;
    }
    Some((value, &bytes[digits..]))
}

/// 整数の直後が ` <gen> R` で続くか（間接参照の末尾）。
fn is_indirect_reference_tail(rest: &[u8]) -> bool {
    let Some((_, after_gen)) = parse_integer(rest) else {
        return false;
    };
    let after_gen = skip_whitespace(after_gen);
    after_gen.first() == Some(&b'R') && after_gen.get(1).is_none_or(|&b| !is_regular(b))
}

/// PDFの空白文字。
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

/// PDFの区切り文字。
fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// 空白でも区切りでもない通常文字か。
fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn skip_whitespace(bytes: &[u8]) -> &[u8] {
    let n = bytes.iter().take_while(|&&b| is_whitespace(b)).count();
    &bytes[n..]
}

/// 文書中の `<< ... >> stream` を先頭から順に列挙するイテレータ。
///
/// 対応する `>>` が先読み窓 `window` の中に見つからない辞書は黙って読み飛ばす。
/// 走査は有限で、`clone()` した時点の位置からやり直せる。
#[derive(Debug, Clone)]
pub struct DictionaryScanner<'a> {
    data: &'a [u8],
    pos: usize,
    window: usize,
    markers: &'a [&'a [u8]],
}

impl<'a> DictionaryScanner<'a> {
    /// `markers` のすべてを含む辞書だけを返すスキャナを作成する。
    pub fn new(data: &'a [u8], window: usize, markers: &'a [&'a [u8]]) -> Self {
        Self {
            data,
            pos: 0,
            window,
            markers,
        }
    }

    /// `open` の位置にある `<<` から辞書とストリーム開始位置を読み取る。
    fn match_at(&self, open: usize) -> Option<StreamDictionary<'a>> {
        let data = self.data;
        let limit = open.saturating_add(self.window).min(data.len());

        let mut depth = 0usize;
        let mut i = open;
        let mut close = None;
        while i + 1 < limit {
            match (data[i], data[i + 1]) {
                (b'<', b'<') => {
                    depth += 1;
                    i += 2;
                }
                (b'>', b'>') => {
                    depth = depth.saturating_sub(1);
                    i += 2;
                    if depth == 0 {
                        close = Some(i - 2);
                        break;
                    }
                }
                _ => i += 1,
            }
        }
        let close = close?;
        let dict = &data[open + 2..close];

        if !self.markers.iter().all(|m| find_bytes(dict, m).is_some()) {
            return None;
        }

        let stream_start = stream_data_start(data, close + 2)?;
        Some(StreamDictionary {
            dict,
            offset: open,
            stream_start,
        })
    }
}

/// `>>` の直後から `stream` キーワードと改行を読み、データ先頭位置を返す。
fn stream_data_start(data: &[u8], after_dict: usize) -> Option<usize> {
    let rest = data.get(after_dict..)?;
    let keyword_pos = after_dict + rest.iter().take_while(|&&b| is_whitespace(b)).count();
    let rest = data.get(keyword_pos..)?;
    let rest = rest.strip_prefix(b"stream")?;

    let eol = if rest.starts_with(b"\r\n") {
        2
    } else if rest.starts_with(b"\n") {
        1
    } else {
        return None;
    };
    Some(keyword_pos + b"stream".len() + eol)
}

impl<'a> Iterator for DictionaryScanner<'a> {
    type Item = StreamDictionary<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let Some(rel) = find_bytes(&self.data[self.pos..], b"<<") else {
                break;
            };
            let open = self.pos + rel;

            if let Some(found) = self.match_at(open) {
                self.pos = found.stream_start;
                return Some(found);
            }
            self.pos = open + 1;
        }
        self.pos = self.data.len();
        None
    }
}

/// 画像XObject辞書（`/Subtype` と `/Image` を含むもの）を列挙する。
pub fn image_dictionaries(data: &[u8], window: usize) -> DictionaryScanner<'_> {
    DictionaryScanner::new(data, window, IMAGE_MARKERS)
}
