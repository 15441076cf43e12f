//! zip 压缩
//!
//! 单个文件以文件名放在压缩包根部；目录以目录名为根写入全部内容，
//! 远程在同一位置解压即可还原原目录名。

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{DeployError, DeployResult};

/// 本地压缩包
#[derive(Clone, Debug)]
pub struct ArchivePackage {
    /// 压缩包路径 `<artifactName>.zip`
    pub path: PathBuf,
    /// 写入的文件数
    pub files: usize,
    /// 压缩包字节数
    pub size: u64,
    /// SHA-256（十六进制）
    pub sha256: String,
}

/// 压缩 `source` 到 `destination`
///
/// 压缩在阻塞线程池中进行，返回时压缩包已完整写入
pub async fn compress(source: &Path, destination: &Path, root_name: &str) -> DeployResult<ArchivePackage> {
    let source_path = source.to_path_buf();
    let destination_path = destination.to_path_buf();
    let root = root_name.to_string();

    let result = tokio::task::spawn_blocking(move || {
        compress_blocking(&source_path, &destination_path, &root)
    })
    .await
    .map_err(|e| io::Error::new(io::ErrorKind::Other, e));

    match result.and_then(|inner| inner) {
        Ok(package) => Ok(package),
        Err(source_err) => Err(DeployError::Compression {
            path: source.to_path_buf(),
            source: source_err,
        }),
    }
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
}

fn compress_blocking(source: &Path, destination: &Path, root_name: &str) -> io::Result<ArchivePackage> {
    let metadata = std::fs::metadata(source)?;
    let mut zip = ZipWriter::new(BufWriter::new(File::create(destination)?));

    let files = if metadata.is_file() {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root_name.to_string());
        write_file(&mut zip, source, &name)?;
        1
    } else {
        write_directory(&mut zip, source, root_name)?
    };

    let mut writer = zip.finish()?;
    writer.flush()?;
    drop(writer);

    let (size, sha256) = digest(destination)?;
    Ok(ArchivePackage {
        path: destination.to_path_buf(),
        files,
        size,
        sha256,
    })
}

fn write_directory<W: Write + io::Seek>(zip: &mut ZipWriter<W>, source: &Path, root_name: &str) -> io::Result<usize> {
    let mut files = 0;
    let walker = WalkDir::new(source).follow_links(true).sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let name = entry_name(root_name, relative);

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), with_permissions(options(), entry.path()))?;
        } else {
            write_file(zip, entry.path(), &name)?;
            files += 1;
        }
    }
    Ok(files)
}

fn write_file<W: Write + io::Seek>(zip: &mut ZipWriter<W>, path: &Path, name: &str) -> io::Result<()> {
    zip.start_file(name, with_permissions(options(), path))?;
    let mut file = File::open(path)?;
    io::copy(&mut file, zip)?;
    Ok(())
}

/// 压缩包内路径统一使用 `/`
fn entry_name(root_name: &str, relative: &Path) -> String {
    let mut name = root_name.to_string();
    for component in relative.components() {
        name.push('/');
        name.push_str(&component.as_os_str().to_string_lossy());
    }
    name
}

#[cfg(unix)]
fn with_permissions(options: SimpleFileOptions, path: &Path) -> SimpleFileOptions {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => options.unix_permissions(meta.permissions().mode()),
        Err(_) => options,
    }
}

#[cfg(not(unix))]
fn with_permissions(options: SimpleFileOptions, _path: &Path) -> SimpleFileOptions {
    options
}

fn digest(path: &Path) -> io::Result<(u64, String)> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((size, format!("{:x}", hasher.finalize())))
}
