// DOCX: パッケージ内の埋め込み画像を文書順に列挙し、最初の1枚を採用する

use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, info, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::config::ExtractionLimits;
use crate::photo::{ExtractedPhoto, PhotoSource};

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
const MEDIA_PREFIX: &str = "word/media/";

/// XMLパートの読み込み上限。
const MAX_XML_PART_BYTES: usize = 32 * 1024 * 1024;

/// 埋め込み画像を列挙する文書変換側の契約。
///
/// 埋め込み画像1枚ごとに、生のバイト列と宣言されたcontent typeで `visit` を呼ぶ。
pub trait EmbeddedImageSource {
    fn for_each_image(
        &self,
        data: &[u8],
        visit: &mut dyn FnMut(&[u8], &str),
    ) -> crate::error::Result<()>;
}

/// 列挙された画像のうち最初の1枚だけを保持して返す。
pub fn first_embedded_image(
    source: &dyn EmbeddedImageSource,
    data: &[u8],
) -> crate::error::Result<Option<ExtractedPhoto>> {
    let mut first: Option<ExtractedPhoto> = None;
    source.for_each_image(data, &mut |bytes: &[u8], content_type: &str| {
        if first.is_none() {
            first = Some(ExtractedPhoto::new(
                content_type,
                bytes.to_vec(),
                PhotoSource::Docx,
            ));
        }
    })?;

    match &first {
        Some(photo) => info!(
            mime = %photo.mime_type,
            bytes = photo.data.len(),
            "DOCX photo extracted"
        ),
        None => info!("DOCX: no embedded images found"),
    }
    Ok(first)
}

/// ZIPパッケージを直接読むDOCXの実装。
///
/// `word/document.xml` の `r:embed` 参照順に画像パートを返す。
/// 参照が1つも解決できなければ `word/media/` 以下をアーカイブ順に返す。
/// content typeは `[Content_Types].xml` の宣言に従い、宣言が無ければ拡張子から推定する。
#[derive(Debug, Clone, Copy)]
pub struct DocxPackage {
    max_part_bytes: usize,
}

impl DocxPackage {
    pub fn new(limits: &ExtractionLimits) -> Self {
        Self {
            max_part_bytes: limits.max_jpeg_bytes,
        }
    }

    /// 画像パート名を文書順に返す。
    fn image_part_names<R: Read + std::io::Seek>(
        &self,
        archive: &mut ZipArchive<R>,
    ) -> crate::error::Result<Vec<String>> {
        let rels = match read_part(archive, DOCUMENT_RELS_PART, MAX_XML_PART_BYTES)? {
            Some(xml) => parse_image_relationships(&xml)?,
            None => HashMap::new(),
        };
        let embed_ids = match read_part(archive, DOCUMENT_PART, MAX_XML_PART_BYTES)? {
            Some(xml) => embedded_relationship_ids(&xml)?,
            None => Vec::new(),
        };

        let mut seen = HashSet::new();
        let referenced: Vec<String> = embed_ids
            .iter()
            .filter_map(|id| rels.get(id))
            .map(|target| resolve_target(target))
            .filter(|name| seen.insert(name.clone()))
            .collect();

        if !referenced.is_empty() {
            return Ok(referenced);
        }

        debug!("DOCX: no resolvable image references, falling back to media parts");
        Ok(archive
            .file_names()
            .filter(|name| name.starts_with(MEDIA_PREFIX) && !name.ends_with('/'))
            .map(str::to_string)
            .collect())
    }
}

impl EmbeddedImageSource for DocxPackage {
    fn for_each_image(
        &self,
        data: &[u8],
        visit: &mut dyn FnMut(&[u8], &str),
    ) -> crate::error::Result<()> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let content_types = match read_part(&mut archive, CONTENT_TYPES_PART, MAX_XML_PART_BYTES)? {
            Some(xml) => ContentTypes::parse(&xml)?,
            None => ContentTypes::default(),
        };

        for name in self.image_part_names(&mut archive)? {
            let Some(bytes) = read_part(&mut archive, &name, self.max_part_bytes)? else {
                continue;
            };
            let content_type = content_types.content_type_of(&name);
            visit(bytes.as_slice(), content_type.as_str());
        }
        Ok(())
    }
}

/// `[Content_Types].xml` に宣言されたcontent type。
///
/// OPCの規則どおりパート名・拡張子は大文字小文字を区別せずに照合する。
#[derive(Debug, Default)]
struct ContentTypes {
    /// 拡張子（小文字） -> content type
    defaults: HashMap<String, String>,
    /// 先頭 `/` を除いたパート名（小文字） -> content type
    overrides: HashMap<String, String>,
}

impl ContentTypes {
    fn parse(xml: &[u8]) -> crate::error::Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();
        let mut types = ContentTypes::default();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e)
                    if matches!(e.local_name().as_ref(), b"Default" | b"Override") =>
                {
                    let is_default = e.local_name().as_ref() == b"Default";

                    let mut key = None;
                    let mut content_type = None;
                    for attr in e.attributes() {
                        let attr = attr.map_err(quick_xml::Error::from)?;
                        let value = attr.unescape_value()?;
                        match attr.key.as_ref() {
                            b"Extension" if is_default => key = Some(value.to_ascii_lowercase()),
                            b"PartName" if !is_default => {
                                key = Some(value.trim_start_matches('/').to_ascii_lowercase())
                            }
                            b"ContentType" => content_type = Some(value.into_owned()),
                            _ => {}
                        }
                    }

                    if let (Some(key), Some(content_type)) = (key, content_type) {
                        if is_default {
                            types.defaults.insert(key, content_type);
                        } else {
                            types.overrides.insert(key, content_type);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(types)
    }

    /// パートのcontent type。宣言が無ければ拡張子から推定する。
    fn content_type_of(&self, part_name: &str) -> String {
        let lower = part_name.to_ascii_lowercase();
        if let Some(declared) = self.overrides.get(&lower) {
            return declared.clone();
        }

        let declared = lower
            .rsplit_once('.')
            .and_then(|(_, ext)| self.defaults.get(ext));
        match declared {
            Some(declared) => declared.clone(),
            None => mime_guess::from_path(part_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        }
    }
}

/// パートを読み込む。存在しない、または上限を超える場合は `None`。
fn read_part<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    max_bytes: usize,
) -> crate::error::Result<Option<Vec<u8>>> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if file.size() > max_bytes as u64 {
        warn!(part = name, size = file.size(), "DOCX part exceeds size limit");
        return Ok(None);
    }

    // 宣言サイズが偽っていても上限+1バイトで打ち切る
    let mut buf = Vec::with_capacity(file.size() as usize);
    file.by_ref()
        .take(max_bytes as u64 + 1)
        .read_to_end(&mut buf)?;
    if buf.len() > max_bytes {
        warn!(part = name, "DOCX part exceeds size limit");
        return Ok(None);
    }
    Ok(Some(buf))
}

/// リレーションシップパートから画像リレーションの Id -> Target を読み取る。
///
/// 外部リンク（`TargetMode="External"`）は除外する。
fn parse_image_relationships(xml: &[u8]) -> crate::error::Result<HashMap<String, String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                let mut is_image = false;
                let mut external = false;

                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    let value = attr.unescape_value()?;
                    match attr.key.as_ref() {
                        b"Id" => id = Some(value.into_owned()),
                        b"Target" => target = Some(value.into_owned()),
                        b"Type" => is_image = value.ends_with("/image"),
                        b"TargetMode" => external = value == "External",
                        _ => {}
                    }
                }

                if let (Some(id), Some(target)) = (id, target)
                    && is_image
                    && !external
                {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// 本文中の画像参照（`r:embed`、VMLの `v:imagedata r:id`）を出現順に返す。
fn embedded_relationship_ids(xml: &[u8]) -> crate::error::Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut ids = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                let vml = e.name().as_ref() == b"v:imagedata";
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    let key = attr.key.as_ref();
                    if key == b"r:embed" || (vml && key == b"r:id") {
                        ids.push(attr.unescape_value()?.into_owned());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(ids)
}

/// `word/` からの相対Targetをパッケージ内のパート名に変換する。
fn resolve_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments = vec!["word"];
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}
