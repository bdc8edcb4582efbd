//! A failed archive rewrite must leave the archive exactly as it was.
//!
//! Failures are injected by squatting a directory on one of the temp paths the
//! rewrite needs, so creating that temp file fails.

use anyhow::Result;
use gridsource::datasource::archive::tar::TarArchiveDataSource;
use gridsource::datasource::archive::zip::ZipArchiveDataSource;
use gridsource::datasource::archive::{
    compressed_temp_path, staging_temp_path, stream_temp_prefix,
};
use gridsource::datasource::{DataSource, ReadOnlyDataSource};
use gridsource::format::CompressionFormat;
use gridsource::testing::{TempDirPath, read_member, write_member};
use std::fs;
use std::io::Write;
use std::path::Path;

fn assert_rewrite_fails_cleanly(
    dir: &TempDirPath,
    source: &dyn DataSource,
    archive: &Path,
    squat: &Path,
) -> Result<()> {
    write_member(source, "net.xiidm", b"original")?;
    write_member(source, "net_mapping.csv", b"id\n")?;
    let before = fs::read(archive)?;

    fs::create_dir(squat)?;
    let mut writer = source.new_output_stream("net.xiidm", false)?;
    writer.write_all(b"replacement")?;
    assert!(writer.close().is_err());

    assert_eq!(fs::read(archive)?, before);
    assert_eq!(read_member(source, "net.xiidm")?, Some(b"original".to_vec()));
    assert_eq!(read_member(source, "net_mapping.csv")?, Some(b"id\n".to_vec()));
    assert!(dir.file_names_starting_with(&stream_temp_prefix(archive))?.is_empty());

    // Once the obstacle is gone the same write goes through.
    fs::remove_dir(squat)?;
    write_member(source, "net.xiidm", b"replacement")?;
    assert_eq!(read_member(source, "net.xiidm")?, Some(b"replacement".to_vec()));
    Ok(())
}

#[test]
fn test_zip_staging_failure() -> Result<()> {
    let dir = TempDirPath::new()?;
    let source = ZipArchiveDataSource::new(dir.path(), "net.zip", "net");
    let archive = source.archive_path();
    assert_rewrite_fails_cleanly(&dir, &source, &archive, &staging_temp_path(&archive))
}

#[test]
fn test_tar_staging_failure() -> Result<()> {
    let dir = TempDirPath::new()?;
    let source = TarArchiveDataSource::new(dir.path(), "net.tar", "net", CompressionFormat::None);
    let archive = source.archive_path();
    assert_rewrite_fails_cleanly(&dir, &source, &archive, &staging_temp_path(&archive))
}

#[cfg(feature = "compression-gzip")]
#[test]
fn test_tar_gz_compression_failure() -> Result<()> {
    let dir = TempDirPath::new()?;
    let source =
        TarArchiveDataSource::new(dir.path(), "net.tar.gz", "net", CompressionFormat::Gzip);
    let archive = source.archive_path();
    let squat = compressed_temp_path(&archive);
    assert_rewrite_fails_cleanly(&dir, &source, &archive, &squat)?;
    // The staging file written before the failing step is cleaned up too.
    assert!(!staging_temp_path(&archive).exists());
    Ok(())
}

#[test]
fn test_spool_failure_is_reported_on_open() -> Result<()> {
    let dir = TempDirPath::new()?;
    let source = ZipArchiveDataSource::new(dir.file_path("missing"), "net.zip", "net");
    assert!(source.new_output_stream("net.xiidm", false).is_err());
    assert!(!dir.file_path("missing").exists());
    Ok(())
}

#[test]
fn test_spool_left_by_a_crash_does_not_block_writes() -> Result<()> {
    let dir = TempDirPath::new()?;
    let source = ZipArchiveDataSource::new(dir.path(), "net.zip", "net");
    let leftover = dir.file_path(&format!(
        "{}stale.stream",
        stream_temp_prefix(&source.archive_path())
    ));
    fs::write(&leftover, b"stale bytes")?;

    write_member(&source, "net.xiidm", b"fresh")?;
    assert_eq!(read_member(&source, "net.xiidm")?, Some(b"fresh".to_vec()));
    assert_eq!(fs::read(&leftover)?, b"stale bytes");
    Ok(())
}

fn assert_interleaved_writers_both_commit(
    dir: &TempDirPath,
    source: &dyn DataSource,
) -> Result<()> {
    let big = vec![b'A'; 20_000];
    let mut first = source.new_output_stream("net_big.csv", false)?;
    first.write_all(&big)?;
    first.flush()?;

    let mut second = source.new_output_stream("net.xiidm", false)?;
    second.write_all(b"bbb")?;
    second.close()?;
    first.close()?;

    assert_eq!(read_member(source, "net.xiidm")?, Some(b"bbb".to_vec()));
    assert_eq!(read_member(source, "net_big.csv")?, Some(big));
    assert_eq!(dir.file_names_starting_with("tmp_")?, Vec::<String>::new());
    Ok(())
}

#[test]
fn test_zip_interleaved_writers_keep_their_own_bytes() -> Result<()> {
    let dir = TempDirPath::new()?;
    let source = ZipArchiveDataSource::new(dir.path(), "net.zip", "net");
    assert_interleaved_writers_both_commit(&dir, &source)
}

#[test]
fn test_tar_interleaved_writers_keep_their_own_bytes() -> Result<()> {
    let dir = TempDirPath::new()?;
    let source = TarArchiveDataSource::new(dir.path(), "net.tar", "net", CompressionFormat::None);
    assert_interleaved_writers_both_commit(&dir, &source)
}

#[test]
fn test_corrupt_archive_is_an_error_not_absence() -> Result<()> {
    let dir = TempDirPath::new()?;
    let source = ZipArchiveDataSource::new(dir.path(), "net.zip", "net");
    fs::write(source.archive_path(), b"definitely not a zip file")?;
    assert!(source.exists("net.xiidm").is_err());
    assert!(write_member(&source, "net.xiidm", b"data").is_err());
    assert_eq!(fs::read(source.archive_path())?, b"definitely not a zip file");
    Ok(())
}
