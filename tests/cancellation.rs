use anyhow::Result;
use docbatch::testing::*;
use docbatch::*;

fn request(dir: &TemplateDir, rows: usize) -> Result<GenerateRequest> {
    let base = dir.write_template("letter.txt", "{{ name }}")?;
    let mut req = GenerateRequest::new(sample_rows(rows), dir.output());
    req.folder_field = "dept".into();
    req.file_field = "name".into();
    req.base_template = Some(base);
    Ok(req)
}

#[test]
fn cancelled_before_start_generates_nothing() -> Result<()> {
    for use_multi_worker in [false, true] {
        let dir = TemplateDir::new()?;
        let mut req = request(&dir, 120)?;
        req.use_multi_worker = use_multi_worker;
        req.max_workers = Some(2);
        let token = CancelToken::new();
        token.cancel();

        let result = generate(req, &PlaceholderRenderer, &token, &NoProgress);

        assert!(result.cancelled);
        assert!(result.fatal_error.is_none());
        assert_run(&result, 0, 0);
    }
    Ok(())
}

#[test]
fn sequential_run_stops_at_the_next_row() -> Result<()> {
    let dir = TemplateDir::new()?;
    let mut req = request(&dir, 20)?;
    req.use_multi_worker = false;
    let token = CancelToken::new();
    // First event fires just before row 10 is processed.
    let progress = RecordingProgress::cancel_after(&token, 1);

    let result = generate(req, &PlaceholderRenderer, &token, &progress);

    assert!(result.cancelled);
    assert_run(&result, 10, 0);
    assert_eq!(output_files(&dir.output()).len(), 10);
    assert_eq!(progress.percents().last(), Some(&100));
    Ok(())
}

#[test]
fn parallel_run_discards_chunks_after_cancel() -> Result<()> {
    let dir = TemplateDir::new()?;
    let mut req = request(&dir, 120)?;
    req.max_workers = Some(2);
    let token = CancelToken::new();
    let progress = RecordingProgress::cancel_after(&token, 1);

    let result = generate(req, &PlaceholderRenderer, &token, &progress);

    assert!(result.cancelled);
    assert!(result.fatal_error.is_none());
    assert!(result.error_messages.is_empty());
    assert_eq!(result.successful_count, 60);
    Ok(())
}

#[test]
fn token_is_shared_between_clones() {
    let token = CancelToken::new();
    let other = token.clone();
    std::thread::spawn(move || other.cancel()).join().unwrap();
    assert!(token.is_cancelled());
}
