//! Converting generated ODIM VP files through the pipeline.

use std::path::PathBuf;

use test_utils::{temp_test_dir, write_vp_h5, VpFixture};
use vpts_csv::{
    write_descriptor, ConversionPipeline, DuplicatePolicy, PipelineOptions, ProfileInput,
    VptsTable,
};

fn write_fixture(dir: &tempfile::TempDir, fixture: &VpFixture) -> PathBuf {
    let path = dir.path().join(fixture.file_name());
    write_vp_h5(&path, fixture).unwrap();
    path
}

fn pipeline(policy: DuplicatePolicy) -> ConversionPipeline {
    ConversionPipeline::new(
        "v1.0",
        PipelineOptions {
            workers: 2,
            duplicate_policy: policy,
        },
    )
    .unwrap()
}

#[test]
fn test_single_file_to_csv() {
    let dir = temp_test_dir();
    let path = write_fixture(&dir, &VpFixture::vol2bird("nosta", "20230311", "000500", 2));

    let table = pipeline(DuplicatePolicy::KeepAll)
        .parse(&ProfileInput::new(&path))
        .unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.column("radar").unwrap(), ["nosta", "nosta"]);
    assert_eq!(
        table.column("datetime").unwrap(),
        ["2023-03-11T00:05:00Z", "2023-03-11T00:05:00Z"]
    );
    assert_eq!(table.column("height").unwrap(), ["0", "200"]);
    assert_eq!(table.column("u").unwrap(), ["1.5", "2.5"]);
    assert_eq!(table.column("dens").unwrap(), ["", "0.5"]);
    assert_eq!(table.column("dbz").unwrap(), ["-5.0", "NaN"]);
    assert_eq!(table.column("gap").unwrap(), ["FALSE", "TRUE"]);
    assert_eq!(table.column("vcp").unwrap(), ["12", "12"]);
    assert_eq!(
        table.column("source_file").unwrap(),
        ["nosta_vp_20230311T000500Z_0x9.h5"; 2]
    );

    let text = String::from_utf8(table.to_csv_bytes().unwrap()).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("radar,datetime,height,u,v,w,ff,dd"));
    assert!(lines
        .next()
        .unwrap()
        .starts_with("nosta,2023-03-11T00:05:00Z,0,1.5,-0.5,0.0,2.0,90.0"));
}

#[test]
fn test_many_files_sorted_by_time_and_height() {
    let dir = temp_test_dir();
    let late = write_fixture(&dir, &VpFixture::vol2bird("nosta", "20230311", "001000", 2));
    let early = write_fixture(&dir, &VpFixture::vol2bird("nosta", "20230311", "000500", 2));

    let table = pipeline(DuplicatePolicy::KeepAll)
        .parse_many(&[ProfileInput::new(late), ProfileInput::new(early)])
        .unwrap();
    assert_eq!(table.len(), 4);
    assert_eq!(
        table.column("datetime").unwrap(),
        [
            "2023-03-11T00:05:00Z",
            "2023-03-11T00:05:00Z",
            "2023-03-11T00:10:00Z",
            "2023-03-11T00:10:00Z",
        ]
    );
    assert_eq!(table.column("height").unwrap(), ["0", "200", "0", "200"]);
}

#[test]
fn test_duplicate_rows_follow_policy() {
    let dir = temp_test_dir();
    let fixture = VpFixture::vol2bird("nosta", "20230311", "000500", 2);
    let path = write_fixture(&dir, &fixture);
    let inputs = [
        ProfileInput::with_reference(&path, "a/nosta.h5"),
        ProfileInput::with_reference(&path, "b/nosta.h5"),
    ];

    let kept = pipeline(DuplicatePolicy::KeepAll).parse_many(&inputs).unwrap();
    assert_eq!(kept.len(), 4);
    assert_eq!(
        kept.column("source_file").unwrap(),
        ["a/nosta.h5", "b/nosta.h5", "a/nosta.h5", "b/nosta.h5"]
    );

    let first = pipeline(DuplicatePolicy::KeepFirst).parse_many(&inputs).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first.column("source_file").unwrap(), ["a/nosta.h5", "a/nosta.h5"]);
}

#[test]
fn test_failing_file_fails_batch() {
    let dir = temp_test_dir();
    let good = write_fixture(&dir, &VpFixture::vol2bird("nosta", "20230311", "000500", 2));
    let bad = dir.path().join("broken.h5");
    std::fs::write(&bad, b"not an hdf5 file").unwrap();

    let err = pipeline(DuplicatePolicy::KeepAll)
        .parse_many(&[ProfileInput::new(good), ProfileInput::new(&bad)])
        .unwrap_err();
    assert_eq!(err.code(), "unreadable_container");
    assert!(err.to_string().contains("broken.h5"));
}

#[test]
fn test_partial_conversion_isolates_failures() {
    let dir = temp_test_dir();
    let good = write_fixture(&dir, &VpFixture::vol2bird("nosta", "20230311", "000500", 2));
    let pvol = write_fixture(
        &dir,
        &VpFixture::vol2bird("nohgb", "20230311", "000500", 2).with_object("PVOL"),
    );

    let result = pipeline(DuplicatePolicy::KeepAll)
        .parse_many_partial(&[ProfileInput::new(good), ProfileInput::new(&pvol)])
        .unwrap();
    assert_eq!(result.table.len(), 2);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].path, pvol);
    assert_eq!(result.failures[0].error.code(), "not_vertical_profile");
}

#[test]
fn test_written_csv_reads_back_with_descriptor() {
    let dir = temp_test_dir();
    let path = write_fixture(&dir, &VpFixture::vol2bird("nosta", "20230311", "000500", 3));
    let pipeline = pipeline(DuplicatePolicy::KeepAll);
    let table = pipeline.parse_many(&[ProfileInput::new(path)]).unwrap();

    let csv_path = dir.path().join("out").join("nosta_vpts_20230311.csv");
    table.write_csv_file(&csv_path).unwrap();
    let descriptor = write_descriptor(&csv_path, pipeline.schema()).unwrap();
    assert!(descriptor.ends_with("datapackage.json"));

    let read = VptsTable::read_csv(std::fs::File::open(&csv_path).unwrap()).unwrap();
    assert_eq!(read, table);
}
