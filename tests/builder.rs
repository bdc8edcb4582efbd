use anyhow::Result;
use gridsource::builder::{Backend, DataSourceBuilder, DataSourceConfig};
use gridsource::datasource::{DataSource, ReadOnlyDataSource};
use gridsource::error::{DataSourceError, ErrorKind};
use gridsource::format::{ArchiveFormat, CompressionFormat};
use gridsource::testing::{RecordingObserver, TempDirPath, read_member, write_member};
use gridsource::util::{
    create_archive_data_source, create_data_source, create_data_source_from_path,
    create_directory_data_source,
};
use std::fs;
use std::sync::Arc;

fn configuration_message(err: &anyhow::Error) -> String {
    assert_eq!(ErrorKind::of(err), Some(ErrorKind::Configuration), "{err:#}");
    err.downcast_ref::<DataSourceError>()
        .map(|err| err.message().to_string())
        .unwrap_or_default()
}

#[test]
fn test_gzip_with_zip_archive_is_rejected_before_io() {
    let err = DataSourceBuilder::new()
        .with_directory("/this/directory/does/not/exist")
        .with_base_name("net")
        .with_compression_format(CompressionFormat::Gzip)
        .with_archive_format(ArchiveFormat::Zip)
        .build()
        .err()
        .unwrap();
    let message = configuration_message(&err);
    assert!(message.contains("gzip"), "{message}");
    assert!(message.contains("zip"), "{message}");
}

#[test]
fn test_missing_directory() {
    let err = DataSourceBuilder::new()
        .with_directory("/this/directory/does/not/exist")
        .with_base_name("net")
        .build()
        .err()
        .unwrap();
    assert!(configuration_message(&err).contains("does not exist"));
}

#[test]
fn test_directory_path_is_a_file() -> Result<()> {
    let dir = TempDirPath::new()?;
    let file = dir.file_path("plain.txt");
    fs::write(&file, b"")?;
    let err = DataSourceBuilder::new()
        .with_directory(&file)
        .with_base_name("net")
        .build()
        .err()
        .unwrap();
    assert!(configuration_message(&err).contains("not a directory"));
    Ok(())
}

#[test]
fn test_archive_file_name_needs_archive_format() -> Result<()> {
    let dir = TempDirPath::new()?;
    let err = DataSourceBuilder::new()
        .with_directory(dir.path())
        .with_base_name("net")
        .with_archive_file_name("net.zip")
        .build()
        .err()
        .unwrap();
    configuration_message(&err);
    Ok(())
}

#[test]
fn test_dispatch() -> Result<()> {
    let dir = TempDirPath::new()?;
    let base = || DataSourceBuilder::new().with_directory(dir.path()).with_base_name("net");

    assert!(matches!(base().build()?, Backend::Directory(_)));
    assert!(matches!(
        base().with_compression_format(CompressionFormat::Zip).build()?,
        Backend::Zip(_)
    ));
    assert!(matches!(
        base().with_archive_format(ArchiveFormat::Zip).build()?,
        Backend::Zip(_)
    ));
    assert!(matches!(
        base().with_archive_format(ArchiveFormat::Tar).build()?,
        Backend::Tar(_)
    ));
    match base().with_compression_format(CompressionFormat::Bzip2).build()? {
        Backend::Directory(source) => {
            assert_eq!(source.compression_format(), CompressionFormat::Bzip2);
        }
        _ => panic!("expected a directory backend"),
    }
    Ok(())
}

#[test]
fn test_default_archive_file_names() -> Result<()> {
    let dir = TempDirPath::new()?;
    let base = || {
        DataSourceBuilder::new()
            .with_directory(dir.path())
            .with_base_name("net")
            .with_source_format_extension("xiidm")
    };

    match base().with_archive_format(ArchiveFormat::Zip).build()? {
        Backend::Zip(source) => assert_eq!(source.archive_path(), dir.file_path("net.xiidm.zip")),
        _ => panic!("expected a zip backend"),
    }
    match base()
        .with_archive_format(ArchiveFormat::Tar)
        .with_compression_format(CompressionFormat::Gzip)
        .build()?
    {
        Backend::Tar(source) => {
            assert_eq!(source.archive_path(), dir.file_path("net.xiidm.tar.gz"));
            assert_eq!(source.compression_format(), CompressionFormat::Gzip);
        }
        _ => panic!("expected a tar backend"),
    }
    match base()
        .with_archive_format(ArchiveFormat::Tar)
        .with_archive_file_name("exports.tar")
        .build()?
    {
        Backend::Tar(source) => assert_eq!(source.archive_path(), dir.file_path("exports.tar")),
        _ => panic!("expected a tar backend"),
    }
    Ok(())
}

#[test]
fn test_backend_delegates() -> Result<()> {
    let dir = TempDirPath::new()?;
    let observer = Arc::new(RecordingObserver::new());
    let backend = DataSourceBuilder::new()
        .with_directory(dir.path())
        .with_base_name("net")
        .with_archive_format(ArchiveFormat::Tar)
        .with_observer(observer.clone())
        .build()?;
    assert_eq!(backend.kind(), "tar");
    assert_eq!(backend.base_name(), "net");

    write_member(&backend, "net.xiidm", b"<network/>")?;
    assert!(backend.exists_ext("", "xiidm")?);
    assert_eq!(read_member(&backend, "net.xiidm")?, Some(b"<network/>".to_vec()));
    assert_eq!(backend.list_names(".*")?.len(), 1);
    assert!(backend.new_output_stream("net.xiidm", true).is_err());
    assert_eq!(observer.events().len(), 4);
    Ok(())
}

#[test]
fn test_from_json_config() -> Result<()> {
    let dir = TempDirPath::new()?;
    let config_path = dir.file_path("source.json");
    let json = serde_json::json!({
        "directory": dir.path(),
        "base_name": "net",
        "archive_format": "zip",
        "source_format_extension": "xiidm",
    });
    fs::write(&config_path, serde_json::to_vec_pretty(&json)?)?;

    let config = DataSourceConfig::from_json_file(&config_path)?;
    assert_eq!(config.archive_format, ArchiveFormat::Zip);
    assert_eq!(config.compression_format, CompressionFormat::None);

    let backend = DataSourceBuilder::from_config(config.clone()).build()?;
    assert!(matches!(backend, Backend::Zip(_)));

    let roundtrip: DataSourceConfig = serde_json::from_str(&serde_json::to_string(&config)?)?;
    assert_eq!(roundtrip, config);
    Ok(())
}

#[test]
fn test_create_data_source_from_file_names() -> Result<()> {
    let dir = TempDirPath::new()?;

    match create_data_source(dir.path(), "net.xiidm.gz", None)? {
        Backend::Directory(source) => {
            assert_eq!(source.base_name(), "net");
            assert_eq!(source.source_format_extension(), "xiidm");
            assert_eq!(source.compression_format(), CompressionFormat::Gzip);
        }
        _ => panic!("expected a directory backend"),
    }
    match create_data_source(dir.path(), "case.tar.zst", None)? {
        Backend::Tar(source) => {
            assert_eq!(source.base_name(), "");
            assert_eq!(source.archive_path(), dir.file_path("case.tar.zst"));
            assert_eq!(source.compression_format(), CompressionFormat::Zstd);
        }
        _ => panic!("expected a tar backend"),
    }
    match create_data_source(dir.path(), "case.zip", None)? {
        Backend::Zip(source) => {
            assert_eq!(source.base_name(), "");
            assert_eq!(source.archive_path(), dir.file_path("case.zip"));
        }
        _ => panic!("expected a zip backend"),
    }
    Ok(())
}

#[test]
fn test_create_data_source_from_path() -> Result<()> {
    let dir = TempDirPath::new()?;
    let exports = dir.file_path("net");
    fs::create_dir(&exports)?;

    let backend = create_data_source_from_path(&exports, None)?;
    assert!(matches!(backend, Backend::Directory(_)));
    assert_eq!(backend.base_name(), "net");

    let file = exports.join("net.xiidm");
    fs::write(&file, b"<network/>")?;
    let backend = create_data_source_from_path(&file, None)?;
    assert_eq!(backend.base_name(), "net");
    assert_eq!(read_member(&backend, "net.xiidm")?, Some(b"<network/>".to_vec()));

    let err = create_data_source_from_path(&exports.join("missing.xiidm"), None)
        .err()
        .unwrap();
    configuration_message(&err);
    Ok(())
}

#[test]
fn test_create_archive_and_directory_sources() -> Result<()> {
    let dir = TempDirPath::new()?;

    let archive = create_archive_data_source(&dir.file_path("bundle.zip"), "net", "xiidm", None)?;
    assert!(matches!(archive, Backend::Zip(_)));
    write_member(&archive, "net.xiidm", b"zipped")?;
    assert!(dir.file_path("bundle.zip").is_file());

    let err = create_archive_data_source(&dir.file_path("net.xiidm"), "net", "xiidm", None)
        .err()
        .unwrap();
    configuration_message(&err);

    let loose =
        create_directory_data_source(dir.path(), "net", "xiidm", CompressionFormat::None, None)?;
    assert!(matches!(loose, Backend::Directory(_)));
    assert!(!loose.exists("net.xiidm")?);
    Ok(())
}
