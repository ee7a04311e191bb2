//! Integration tests for the initrd builder and image assembly.
//!
//! These run against mock build trees in a temp directory. The ISO tool is
//! replaced by a shell script, so no bootloader tooling is needed.

mod helpers;

use helpers::{
    assert_file_contains, assert_file_exists, assert_not_exists, create_mock_build_tree,
    create_mock_etc_tree, create_script, write_file, TestEnv,
};
use bootpack::image;
use bootpack::initrd::{
    self, build_container, default_passes, read_container, ArchiveBuilder, Candidate,
    CandidateKind, ClassificationRules, Entry, EntryReader, Pass,
};
use std::fs;

// =============================================================================
// Container format
// =============================================================================

#[test]
fn test_container_round_trip_with_exact_length() {
    let env = TestEnv::new();
    create_mock_build_tree(&env.build_dir);
    create_mock_etc_tree(&env.etc_dir);
    let config = env.config();

    let output = initrd::build_initrd(&config).expect("build_initrd failed");
    let entries = read_container(&output).expect("container should parse");

    let expected_len: u64 = entries
        .iter()
        .map(|e| 8 + e.path.len() as u64 + e.contents.len() as u64)
        .sum();
    assert_eq!(fs::metadata(&output).unwrap().len(), expected_len);

    let shell = entries.iter().find(|e| e.path == "/bin/shell.bin").unwrap();
    assert_eq!(shell.contents, b"\x7fELF shell");
    let motd = entries.iter().find(|e| e.path == "/etc/motd").unwrap();
    assert_eq!(motd.contents, b"Welcome\n");
}

#[test]
fn test_empty_file_has_zero_content_length() {
    let env = TestEnv::new();
    create_mock_etc_tree(&env.etc_dir);
    let output = env.output_dir.join("initrd");

    build_container(
        &output,
        &[Pass::subtree(&env.etc_dir, "/etc")],
        ClassificationRules::default(),
        None,
    )
    .unwrap();

    let bytes = fs::read(&output).unwrap();
    let mut reader = EntryReader::new(bytes.as_slice());
    let first = reader.next_entry().unwrap().unwrap();
    assert_eq!(first, Entry::new("/etc/empty", Vec::<u8>::new()));

    // Header of the empty entry: path length 10, content length 0
    assert_eq!(&bytes[..8], &[10, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(&bytes[8..18], b"/etc/empty");
}

#[test]
fn test_classified_pass_selects_and_places_files() {
    let env = TestEnv::new();
    create_mock_build_tree(&env.build_dir);
    let output = env.output_dir.join("initrd");

    build_container(
        &output,
        &[Pass::classified(&env.build_dir, "/")],
        ClassificationRules::default(),
        None,
    )
    .unwrap();

    let paths: Vec<String> = read_container(&output)
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    assert_eq!(
        paths,
        [
            "/bin/shell.bin",
            "/bin/test.bin",
            "/firedrake",
            "/lib/libc.so",
            "/lib/libm.so.1",
        ]
    );
}

#[test]
fn test_builds_are_byte_identical() {
    let env = TestEnv::new();
    create_mock_build_tree(&env.build_dir);
    create_mock_etc_tree(&env.etc_dir);
    let config = env.config();
    let passes = default_passes(&config);

    let first = env.output_dir.join("first");
    let second = env.output_dir.join("second");
    build_container(&first, &passes, ClassificationRules::default(), None).unwrap();
    build_container(&second, &passes, ClassificationRules::default(), None).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn test_earlier_pass_entries_precede_later_ones() {
    let env = TestEnv::new();
    create_mock_build_tree(&env.build_dir);
    create_mock_etc_tree(&env.etc_dir);
    let config = env.config();

    let output = initrd::build_initrd(&config).unwrap();
    let entries = read_container(&output).unwrap();

    let first_etc = entries
        .iter()
        .position(|e| e.path.starts_with("/etc/"))
        .expect("etc pass should contribute entries");
    assert_eq!(first_etc, 5);
    assert!(entries[first_etc..].iter().all(|e| e.path.starts_with("/etc/")));
    assert!(entries[..first_etc].iter().all(|e| !e.path.starts_with("/etc/")));
}

#[test]
fn test_missing_etc_tree_skips_pass() {
    let env = TestEnv::new();
    create_mock_build_tree(&env.build_dir);
    fs::remove_dir_all(&env.etc_dir).unwrap();
    let config = env.config();

    assert_eq!(default_passes(&config).len(), 1);
    let output = initrd::build_initrd(&config).unwrap();
    assert_eq!(read_container(&output).unwrap().len(), 5);
}

#[test]
fn test_missing_build_tree_is_an_error() {
    let env = TestEnv::new();
    let config = env.config_with(&[("BOOTPACK_BUILD_DIR", "no-such-build")]);

    let err = initrd::build_initrd(&config).unwrap_err();
    assert!(err.to_string().contains("Build tree not found"));
    assert_not_exists(&config.initrd_path());
}

#[test]
fn test_duplicate_paths_are_kept_in_order() {
    let mut builder = ArchiveBuilder::new(Vec::new());
    builder.add_bytes("/etc/motd", b"first").unwrap();
    builder.add_bytes("/etc/motd", b"second").unwrap();
    let (bytes, summary) = builder.finish().unwrap();

    assert_eq!(summary.entries, 2);
    let entries: Vec<Entry> = EntryReader::new(bytes.as_slice())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries[0].contents, b"first");
    assert_eq!(entries[1].contents, b"second");
}

#[test]
fn test_unreadable_source_leaves_earlier_entries_intact() {
    let env = TestEnv::new();
    write_file(&env.etc_dir.join("motd"), b"Welcome\n");

    let mut builder = ArchiveBuilder::new(Vec::new());
    builder
        .add_candidate(&Candidate {
            source: env.etc_dir.join("motd"),
            target: "/etc/motd".to_string(),
            kind: CandidateKind::Auxiliary,
        })
        .expect("readable source should be framed");

    let err = builder
        .add_candidate(&Candidate {
            source: env.etc_dir.join("vanished"),
            target: "/etc/vanished".to_string(),
            kind: CandidateKind::Auxiliary,
        })
        .unwrap_err();
    assert!(err.to_string().contains("Failed to read"));

    let (bytes, summary) = builder.finish().unwrap();
    assert_eq!(summary.entries, 1);
    let entries: Vec<Entry> = EntryReader::new(bytes.as_slice())
        .collect::<Result<_, _>>()
        .expect("partial container should still parse");
    assert_eq!(entries, [Entry::new("/etc/motd", b"Welcome\n".to_vec())]);
}

#[test]
fn test_custom_kernel_name() {
    let env = TestEnv::new();
    write_file(&env.build_dir.join("kernel.elf"), b"kernel");
    write_file(&env.build_dir.join("firedrake"), b"not the kernel now");
    let config = env.config_with(&[("BOOTPACK_KERNEL_NAME", "kernel.elf")]);

    let output = initrd::build_initrd(&config).unwrap();
    let paths: Vec<String> = read_container(&output)
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();
    assert_eq!(paths, ["/kernel.elf"]);
}

// =============================================================================
// Image assembly
// =============================================================================

/// A stand-in ISO tool that records its arguments and the staged tree.
fn fake_iso_tool(env: &TestEnv, exit_code: i32) -> String {
    let tool = env.base_dir.join("fake-mkrescue");
    let record = env.base_dir.join("record");
    create_script(
        &tool,
        &format!(
            r#"echo "$@" > "{record}/args"
staging=""
for arg in "$@"; do staging="$arg"; done
cp -r "$staging" "{record}/staged"
: > "$3"
exit {code}"#,
            record = record.display(),
            code = exit_code,
        ),
    );
    fs::create_dir_all(&record).unwrap();
    tool.display().to_string()
}

#[test]
fn test_create_image_stages_and_cleans_up() {
    let env = TestEnv::new();
    create_mock_build_tree(&env.build_dir);
    let tool = fake_iso_tool(&env, 0);
    let config = env.config_with(&[("BOOTPACK_ISO_TOOL", tool.as_str())]);

    initrd::build_initrd(&config).unwrap();
    let iso = image::create_image(&config).expect("create_image failed");

    assert_eq!(iso, config.iso_path());
    assert_file_exists(&iso);

    let record = env.base_dir.join("record");
    assert_file_contains(&record.join("args"), "--modules=multiboot normal ext2 part_msdos");
    assert_file_contains(&record.join("args"), "-o");
    assert_file_contains(&record.join("staged/boot/grub/grub.cfg"), "module /boot/initrd initrd");
    assert_eq!(
        fs::read(record.join("staged/boot/firedrake")).unwrap(),
        b"\x7fELF kernel"
    );
    assert_eq!(
        fs::read(record.join("staged/boot/initrd")).unwrap(),
        fs::read(config.initrd_path()).unwrap()
    );

    assert_not_exists(&env.output_dir.join(image::STAGING_DIR_NAME));
}

#[test]
fn test_failing_iso_tool_still_removes_staging() {
    let env = TestEnv::new();
    create_mock_build_tree(&env.build_dir);
    let tool = fake_iso_tool(&env, 3);
    let config = env.config_with(&[("BOOTPACK_ISO_TOOL", tool.as_str())]);

    initrd::build_initrd(&config).unwrap();
    let err = image::create_image(&config).unwrap_err();

    assert!(err.to_string().contains("exit code 3"));
    assert_not_exists(&env.output_dir.join(image::STAGING_DIR_NAME));
}

#[test]
fn test_create_image_requires_kernel() {
    let env = TestEnv::new();
    let config = env.config();

    let err = image::create_image(&config).unwrap_err();
    assert!(err.to_string().contains("Kernel not found"));
}
