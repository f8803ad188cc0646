use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{Error, Result};

/// 归档中可接受的图片扩展名
pub const IMAGE_EXTENSIONS: [&str; 5] = ["tiff", "tif", "png", "jpg", "jpeg"];

/// 从归档中解出的一张图片
#[derive(Debug)]
pub struct ExtractedImage {
    /// 图片标识，即文件名去掉扩展名
    pub id: String,
    /// 图片资产定位符，`归档路径:图片标识`
    pub image_ref: String,
    pub data: Vec<u8>,
}

/// 扫描目录下的所有 zip 归档，按路径排序保证遍历顺序稳定
pub fn scan_zip_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::InputValidation(format!("zip 目录不存在: {}", dir.display())));
    }
    let mut archives: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension().map(|ext| ext.eq_ignore_ascii_case("zip")) == Some(true)
        })
        .collect();
    archives.sort();
    info!("在 {} 下找到 {} 个 zip 归档", dir.display(), archives.len());
    Ok(archives)
}

/// 解开一个 zip 归档，返回其中所有可接受扩展名的图片
pub fn extract_archive(archive_path: &Path) -> Result<Vec<ExtractedImage>> {
    let file = File::open(archive_path)
        .map_err(|e| Error::InputValidation(format!("无法打开归档 {}: {e}", archive_path.display())))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| Error::InputValidation(format!("归档 {} 无法解析: {e}", archive_path.display())))?;

    let mut images = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::InputValidation(format!("归档条目读取失败: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let entry_path = PathBuf::from(entry.name());
        let ext = entry_path.extension().map(|s| s.to_string_lossy().to_lowercase());
        if ext.as_deref().map(|e| IMAGE_EXTENSIONS.contains(&e)) != Some(true) {
            continue;
        }
        let Some(id) = entry_path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };

        let mut data = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut data) {
            warn!("读取归档条目 {} 失败，跳过: {e}", entry.name());
            continue;
        }
        let image_ref = format!("{}:{}", archive_path.display(), id);
        images.push(ExtractedImage { id, image_ref, data });
    }
    Ok(images)
}
