// 入力ファイル単位: 読込 -> 種別判定 -> 写真抽出 -> 出力書込

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;

use crate::config::ExtractionLimits;
use crate::document::{DocumentKind, extract_photo_as};
use crate::error::PhotoError;
use crate::photo::ExtractedPhoto;

/// 1ファイル分の処理設定。
#[derive(Debug, Clone)]
pub struct PhotoJob {
    pub input_path: PathBuf,
    pub limits: ExtractionLimits,
    /// trueなら写真を入力ファイルの隣に書き出す。
    pub write_output: bool,
}

/// 1ファイル分の処理結果。
#[derive(Debug)]
pub struct PhotoReport {
    pub input_path: PathBuf,
    pub photo: Option<ExtractedPhoto>,
    /// 書き出した場合の出力パス。
    pub output_path: Option<PathBuf>,
}

/// 写真の出力先: `<stem>.photo.<ext>` を入力と同じディレクトリに置く。
pub fn output_path_for(input_path: &Path, photo: &ExtractedPhoto) -> PathBuf {
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    input_path.with_file_name(format!("{stem}.photo.{}", photo.file_extension()))
}

/// 1ファイルを処理する。
pub fn run_job(job: &PhotoJob) -> crate::error::Result<PhotoReport> {
    let kind = DocumentKind::from_path(&job.input_path).ok_or_else(|| {
        PhotoError::unsupported_document(format!(
            "cannot determine document type of {}",
            job.input_path.display()
        ))
    })?;

    let data = std::fs::read(&job.input_path)?;
    debug!(
        path = %job.input_path.display(),
        mime = kind.mime_type(),
        bytes = data.len(),
        "extracting photo"
    );

    let photo = extract_photo_as(&data, kind, &job.limits)?;

    let output_path = match (&photo, job.write_output) {
        (Some(photo), true) => {
            let path = output_path_for(&job.input_path, photo);
            std::fs::write(&path, &photo.data)?;
            Some(path)
        }
        _ => None,
    };

    Ok(PhotoReport {
        input_path: job.input_path.clone(),
        photo,
        output_path,
    })
}

/// 複数ファイルを並列に処理する。
/// 1ファイルの失敗は他のファイルの処理を妨げない。結果は入力と同じ順序で返す。
pub fn run_all(jobs: &[PhotoJob]) -> Vec<crate::error::Result<PhotoReport>> {
    jobs.par_iter().map(run_job).collect()
}
