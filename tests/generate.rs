use anyhow::Result;
use docbatch::testing::*;
use docbatch::*;
use std::fs;

fn request(dir: &TemplateDir, rows: Vec<Row>) -> Result<GenerateRequest> {
    let base = dir.write_template("letter.txt", "Dear {{ name }} ({{ dept }}), ref {{ 编号 }}")?;
    let mut req = GenerateRequest::new(rows, dir.output());
    req.folder_field = "dept".into();
    req.file_field = "name".into();
    req.base_template = Some(base);
    Ok(req)
}

#[test]
fn three_rows_with_base_template() -> Result<()> {
    let dir = TemplateDir::new()?;
    let req = request(&dir, sample_rows(3))?;

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_run(&result, 3, 0);
    assert!(result.fatal_error.is_none());
    assert!(!result.cancelled);
    let body = fs::read_to_string(dir.output().join("ops").join("person_2.txt"))?;
    assert_eq!(body, "Dear person_2 (ops), ref ");
    Ok(())
}

#[test]
fn blank_folder_and_file_use_defaults() -> Result<()> {
    let dir = TemplateDir::new()?;
    let rows = vec![Row::new().with("dept", "").with("name", "")];
    let req = request(&dir, rows)?;

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_run(&result, 1, 0);
    assert!(dir.output().join("folder_1").join("file_1.txt").is_file());
    Ok(())
}

#[test]
fn duplicate_names_get_numeric_suffixes() -> Result<()> {
    let dir = TemplateDir::new()?;
    let rows = vec![
        Row::new().with("dept", "ops").with("name", "same"),
        Row::new().with("dept", "ops").with("name", "same"),
        Row::new().with("dept", "ops").with("name", "same"),
    ];
    let req = request(&dir, rows)?;

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_run(&result, 3, 0);
    let files = output_files(&dir.output());
    let names: Vec<_> = files
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["same.txt", "same_1.txt", "same_2.txt"]);
    Ok(())
}

#[test]
fn sixty_rows_on_worker_pool() -> Result<()> {
    let dir = TemplateDir::new()?;
    let mut req = request(&dir, sample_rows(60))?;
    req.max_workers = Some(4);
    assert!(matches!(
        ExecMode::plan(60, req.use_multi_worker, req.max_workers),
        ExecMode::Parallel { chunk_size: 50, .. }
    ));

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_eq!(result.successful_count + result.error_messages.len(), 60);
    assert_run(&result, 60, 0);
    assert_eq!(output_files(&dir.output()).len(), 60);
    Ok(())
}

#[test]
fn parallel_and_sequential_write_the_same_files() -> Result<()> {
    let seq_dir = TemplateDir::new()?;
    let mut seq = request(&seq_dir, sample_rows(130))?;
    seq.use_multi_worker = false;
    let par_dir = TemplateDir::new()?;
    let mut par = request(&par_dir, sample_rows(130))?;
    par.max_workers = Some(3);

    let a = generate(seq, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);
    let b = generate(par, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_run(&a, 130, 0);
    assert_run(&b, 130, 0);
    let rel = |dir: &TemplateDir| -> Vec<_> {
        output_files(&dir.output())
            .into_iter()
            .map(|p| p.strip_prefix(dir.output()).map(|r| r.to_path_buf()))
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    };
    assert_eq!(rel(&seq_dir), rel(&par_dir));
    Ok(())
}

#[test]
fn unavailable_template_fails_only_its_rows() -> Result<()> {
    let dir = TemplateDir::new()?;
    let mut req = request(&dir, sample_rows(4))?;
    let missing = dir.missing_template("memo.txt");
    req.template_mapping = Some(TemplateMapping::new().with_rule("kind", "memo", &missing));

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_run(&result, 2, 2);
    assert_row_error(&result, 2, "template unavailable");
    assert_row_error(&result, 4, "template unavailable");
    assert!(dir.output().join("sales").join("person_1.txt").is_file());
    assert!(!dir.output().join("ops").join("person_2.txt").exists());
    Ok(())
}

#[test]
fn mapping_routes_rows_to_templates() -> Result<()> {
    let dir = TemplateDir::new()?;
    let mut req = request(&dir, sample_rows(4))?;
    let memo = dir.write_template("memo.txt", "MEMO {{ name }} {{ amount }}")?;
    let legal = dir.write_template("legal.txt", "LEGAL {{ name }}")?;
    req.template_mapping = Some(
        TemplateMapping::new()
            .with_rule("kind", "memo", &memo)
            .with_rule("dept", "legal", &legal)
            .with_priority(["dept", "kind"]),
    );

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_run(&result, 4, 0);
    let out = dir.output();
    assert!(fs::read_to_string(out.join("sales").join("person_1.txt"))?.starts_with("Dear"));
    assert_eq!(fs::read_to_string(out.join("ops").join("person_2.txt"))?, "MEMO person_2 200");
    assert_eq!(fs::read_to_string(out.join("legal").join("person_3.txt"))?, "LEGAL person_3");
    assert_eq!(fs::read_to_string(out.join("sales").join("person_4.txt"))?, "MEMO person_4 400");
    Ok(())
}

#[test]
fn missing_base_template_is_fatal_and_writes_nothing() -> Result<()> {
    let dir = TemplateDir::new()?;
    let mut req = GenerateRequest::new(sample_rows(3), dir.output());
    req.base_template = Some(dir.missing_template("nope.txt"));

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert!(matches!(result.fatal_error, Some(FatalError::BaseTemplateMissing(_))));
    assert_eq!(result.successful_count, 0);
    assert_eq!(result.error_messages.len(), 1);
    assert!(!dir.output().exists());
    Ok(())
}

#[test]
fn no_usable_templates_is_fatal() -> Result<()> {
    let dir = TemplateDir::new()?;
    let mut req = GenerateRequest::new(sample_rows(3), dir.output());
    req.template_mapping = Some(
        TemplateMapping::new().with_rule("kind", "memo", dir.missing_template("memo.txt")),
    );

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_eq!(result.fatal_error, Some(FatalError::NoUsableTemplates));
    assert_eq!(result.successful_count, 0);
    assert!(!dir.output().exists());
    Ok(())
}

#[test]
fn empty_dataset_is_a_no_op() -> Result<()> {
    let dir = TemplateDir::new()?;
    let req = request(&dir, Vec::new())?;
    let progress = RecordingProgress::new();

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &progress);

    assert_run(&result, 0, 0);
    assert!(result.fatal_error.is_none());
    assert_eq!(progress.percents(), vec![0]);
    assert!(!dir.output().exists());
    Ok(())
}

#[test]
fn sequential_progress_every_ten_rows_and_at_end() -> Result<()> {
    let dir = TemplateDir::new()?;
    let req = request(&dir, sample_rows(25))?;
    let progress = RecordingProgress::new();

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &progress);

    assert_run(&result, 25, 0);
    assert_eq!(progress.percents(), vec![40, 80, 100, 100]);
    let events = progress.events();
    assert_eq!(events[0].message, "generating document 10/25...");
    assert!(events[3].message.starts_with("document generation finished in"));
    Ok(())
}

#[test]
fn parallel_progress_per_chunk() -> Result<()> {
    let dir = TemplateDir::new()?;
    let mut req = request(&dir, sample_rows(150))?;
    req.max_workers = Some(3);
    let progress = RecordingProgress::new();

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &progress);

    assert_run(&result, 150, 0);
    assert_eq!(progress.percents(), vec![33, 66, 100, 100]);
    Ok(())
}

#[test]
fn missing_placeholders_fail_rows_unless_ignored() -> Result<()> {
    let dir = TemplateDir::new()?;
    let base = dir.write_template("strict.txt", "{{ name }} {{ signature }}")?;

    let mut strict = GenerateRequest::new(sample_rows(2), dir.output());
    strict.folder_field = "dept".into();
    strict.file_field = "name".into();
    strict.base_template = Some(base.clone());
    let result = generate(strict.clone(), &PlaceholderRenderer, &CancelToken::new(), &NoProgress);
    assert_run(&result, 0, 2);
    assert_row_error(&result, 1, "missing placeholder");
    assert_row_error(&result, 2, "signature");

    let mut lenient = strict;
    lenient.ignore_missing = true;
    let result = generate(lenient, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);
    assert_run(&result, 2, 0);
    let body = fs::read_to_string(dir.output().join("sales").join("person_1.txt"))?;
    assert_eq!(body, "person_1 {{ signature }}");
    Ok(())
}

#[test]
fn renderer_errors_are_row_errors_in_both_modes() -> Result<()> {
    let renderer = FaultyRenderer::new("name", "person_70", Fault::Error);

    for use_multi_worker in [false, true] {
        let dir = TemplateDir::new()?;
        let mut req = request(&dir, sample_rows(120))?;
        req.use_multi_worker = use_multi_worker;
        req.max_workers = Some(2);

        let result = generate(req, &renderer, &CancelToken::new(), &NoProgress);

        assert_run(&result, 119, 1);
        assert_row_error(&result, 70, "injected failure");
    }
    Ok(())
}

#[test]
fn worker_panic_fails_only_its_row() -> Result<()> {
    let dir = TemplateDir::new()?;
    let mut req = request(&dir, sample_rows(120))?;
    req.max_workers = Some(2);
    let renderer = FaultyRenderer::new("name", "person_55", Fault::Panic);

    let result = generate(req, &renderer, &CancelToken::new(), &NoProgress);

    assert_run(&result, 119, 1);
    assert_row_error(&result, 55, "injected panic");
    assert!(result.fatal_error.is_none());
    assert_eq!(output_files(&dir.output()).len(), 119);
    Ok(())
}

#[test]
fn panics_give_the_same_result_in_both_modes() -> Result<()> {
    let renderer = FaultyRenderer::new("name", "person_101", Fault::Panic);

    for use_multi_worker in [false, true] {
        let dir = TemplateDir::new()?;
        let mut req = request(&dir, sample_rows(150))?;
        req.use_multi_worker = use_multi_worker;
        req.max_workers = Some(3);

        let result = generate(req, &renderer, &CancelToken::new(), &NoProgress);

        assert_run(&result, 149, 1);
        assert_row_error(&result, 101, "document generation failed");
    }
    Ok(())
}

#[test]
fn sequential_panic_is_a_row_error() -> Result<()> {
    let dir = TemplateDir::new()?;
    let req = request(&dir, sample_rows(5))?;
    let renderer = FaultyRenderer::new("name", "person_3", Fault::Panic);

    let result = generate(req, &renderer, &CancelToken::new(), &NoProgress);

    assert_run(&result, 4, 1);
    assert_row_error(&result, 3, "injected panic");
    Ok(())
}

#[test]
fn blocked_folder_fails_its_rows_only() -> Result<()> {
    let dir = TemplateDir::new()?;
    fs::create_dir_all(dir.output())?;
    fs::write(dir.output().join("sales"), b"not a directory")?;
    let req = request(&dir, sample_rows(3))?;

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_run(&result, 2, 1);
    assert_row_error(&result, 1, "document generation failed");
    Ok(())
}

#[test]
fn output_extension_override() -> Result<()> {
    let dir = TemplateDir::new()?;
    let mut req = request(&dir, sample_rows(1))?;
    req.extension = Some("md".into());

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_run(&result, 1, 0);
    assert!(dir.output().join("sales").join("person_1.md").is_file());
    Ok(())
}

#[test]
fn mapping_only_run_keeps_template_extensions() -> Result<()> {
    let dir = TemplateDir::new()?;
    let memo = dir.write_template("memo.txt", "memo {{ name }}")?;
    let letter = dir.write_template("letter.md", "# {{ name }}")?;
    let mut req = GenerateRequest::new(sample_rows(2), dir.output());
    req.folder_field = "dept".into();
    req.file_field = "name".into();
    req.template_mapping = Some(
        TemplateMapping::new()
            .with_rule("kind", "memo", &memo)
            .with_rule("kind", "letter", &letter),
    );

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_run(&result, 2, 0);
    let out = dir.output();
    assert_eq!(fs::read_to_string(out.join("sales").join("person_1.md"))?, "# person_1");
    assert_eq!(fs::read_to_string(out.join("ops").join("person_2.txt"))?, "memo person_2");
    assert!(!out.join("ops").join("person_2.docx").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn unreadable_template_is_left_out_of_the_usable_set() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = TemplateDir::new()?;
    let mut req = request(&dir, sample_rows(2))?;
    let locked = dir.write_template("locked.txt", "secret {{ name }}")?;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))?;
    if fs::File::open(&locked).is_ok() {
        // Privileged users can open it anyway; nothing to check.
        return Ok(());
    }
    req.template_mapping = Some(TemplateMapping::new().with_rule("kind", "memo", &locked));

    let result = generate(req, &PlaceholderRenderer, &CancelToken::new(), &NoProgress);

    assert_run(&result, 1, 1);
    assert_row_error(&result, 2, "template unavailable");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644))?;
    Ok(())
}
