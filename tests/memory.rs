use anyhow::Result;
use gridsource::datasource::memory::InMemoryDataSource;
use gridsource::datasource::{DataSource, ReadOnlyDataSource};
use gridsource::error::ErrorKind;
use gridsource::testing::{read_member, sample_members, write_member};
use std::io::Write;

#[test]
fn test_writes_are_invisible_until_close() -> Result<()> {
    let source = InMemoryDataSource::new("net");
    let mut writer = source.new_output_stream("net.xiidm", false)?;
    writer.write_all(b"<network/>")?;
    assert!(!source.exists("net.xiidm")?);
    assert!(source.new_input_stream("net.xiidm")?.is_none());

    writer.close()?;
    assert_eq!(source.get_data("net.xiidm"), Some(b"<network/>".to_vec()));
    Ok(())
}

#[test]
fn test_append_concatenates_on_commit() -> Result<()> {
    let source = InMemoryDataSource::new("net");
    source.put_data("net.log", b"one ".to_vec());

    let mut writer = source.new_output_stream("net.log", true)?;
    writer.write_all(b"two")?;
    assert_eq!(source.get_data("net.log"), Some(b"one ".to_vec()));
    writer.close()?;
    assert_eq!(read_member(&source, "net.log")?, Some(b"one two".to_vec()));

    let mut writer = source.new_output_stream_ext("_new", "log", true)?;
    writer.write_all(b"fresh")?;
    writer.close()?;
    assert_eq!(source.get_data("net_new.log"), Some(b"fresh".to_vec()));
    Ok(())
}

#[test]
fn test_replace() -> Result<()> {
    let source = InMemoryDataSource::new("net");
    write_member(&source, "net.xiidm", b"v1")?;
    write_member(&source, "net.xiidm", b"v2")?;
    assert_eq!(source.get_data("net.xiidm"), Some(b"v2".to_vec()));
    assert_eq!(source.names().len(), 1);
    Ok(())
}

#[test]
fn test_list_names() -> Result<()> {
    let source = InMemoryDataSource::new("net");
    for (name, data) in sample_members() {
        source.put_data(name, data);
    }
    source.put_data("other.xiidm", b"".to_vec());

    let csv: Vec<_> = source.list_names(r".*\.csv")?.into_iter().collect();
    assert_eq!(csv, ["net_mapping.csv"]);
    assert_eq!(source.list_names(".*")?.len(), 3);
    assert!(source.exists("other.xiidm")?);

    let err = source.list_names("(").err().unwrap();
    assert_eq!(ErrorKind::of(&err), Some(ErrorKind::InvalidInput));
    Ok(())
}
