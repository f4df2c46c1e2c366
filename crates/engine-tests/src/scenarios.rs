#[cfg(test)]
mod tests {
    use crate::{
        fakes::{InsertFaults, MemorySource},
        utils::{Harness, config, config_with_policy, event_columns, events, people, people_columns},
    };
    use engine_config::FailurePolicy;
    use engine_core::state::{CheckpointStore, FileCheckpointStore};
    use engine_runtime::report::JobState;
    use model::{core::value::Value, pagination::position::ResumePosition};
    use planner::query::pagination::{FetchWindow, PaginationMode};
    use std::{sync::Arc, time::Duration};
    use tracing_test::traced_test;

    const PEOPLE: &str = "public.people";

    // Scenario: one sort column, batch size 2, five source rows.
    // Expected Outcome:
    // - Offset pagination fetches at offsets 0, 2, 4 and stops on the short page.
    // - Checkpoints 2, 4, 5 are written, then reset to 0 on completion.
    #[traced_test]
    #[tokio::test]
    async fn offset_job_checkpoints_every_chunk() {
        let h = Harness::people(5);
        let cfg = config(2, "      - { source: dbo.People, dest: people, sort_columns: [Id] }\n");

        let summary = h.run(&cfg).await;
        let report = &summary.jobs[0];

        assert_eq!(report.state, JobState::Completed, "{:?}", report.error);
        assert_eq!(report.mode, Some(PaginationMode::Offset));
        assert_eq!(
            h.source.windows(),
            vec![
                FetchWindow::Offset { offset: 0, limit: 2 },
                FetchWindow::Offset { offset: 2, limit: 2 },
                FetchWindow::Offset { offset: 4, limit: 2 },
            ]
        );
        assert_eq!(
            h.checkpoints.history(),
            vec![
                ResumePosition::Offset(2),
                ResumePosition::Offset(4),
                ResumePosition::Offset(5),
                ResumePosition::FRESH,
            ]
        );
        assert_eq!(h.target_ids(PEOPLE), vec![1, 2, 3, 4, 5]);
        assert_eq!(report.rows_written, 5);
        assert_eq!(report.chunks, 3);
        assert!(logs_contain("Chunk committed"));
    }

    // Scenario: no sort columns.
    // Expected Outcome: one unordered fetch of everything, no checkpoint
    // writes, and the non-determinism warning logged exactly once.
    #[traced_test]
    #[tokio::test]
    async fn single_shot_job_never_checkpoints() {
        let h = Harness::people(7);
        let cfg = config(2, "      - { source: dbo.People, dest: people }\n");

        let summary = h.run(&cfg).await;

        assert_eq!(summary.jobs[0].state, JobState::Completed);
        assert_eq!(summary.jobs[0].mode, Some(PaginationMode::SingleShot));
        assert_eq!(h.source.windows(), vec![FetchWindow::All]);
        assert!(h.checkpoints.history().is_empty());
        assert_eq!(h.target_ids(PEOPLE).len(), 7);
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("cannot resume")).count() {
                1 => Ok(()),
                n => Err(format!("expected one single-shot warning, saw {n}")),
            }
        });
    }

    // Scenario: inserts fail from the third chunk on, after two chunks succeeded.
    // Expected Outcome:
    // - The job is reported failed with a transient I/O error.
    // - The stored checkpoint marks the end of chunk 2.
    // - Rows of chunks 1 and 2 are in the target exactly once.
    #[traced_test]
    #[tokio::test]
    async fn failed_insert_keeps_last_durable_checkpoint() {
        let h = Harness::people(7);
        h.target.set_faults(InsertFaults::FailFrom(3));
        let cfg = config(2, "      - { source: dbo.People, dest: people, sort_columns: [Id] }\n");

        let summary = h.run(&cfg).await;
        let report = &summary.jobs[0];

        assert_eq!(report.state, JobState::Failed);
        assert_eq!(report.error.as_ref().map(|e| e.kind), Some("transient_io"));
        assert_eq!(report.checkpoint, Some(ResumePosition::Offset(4)));
        let key = report.key.clone().unwrap();
        assert_eq!(h.checkpoints.get(&key).await, ResumePosition::Offset(4));
        assert_eq!(h.target_ids(PEOPLE), vec![1, 2, 3, 4]);
        // One initial attempt plus two retries on chunk 3.
        assert_eq!(h.target.insert_calls(), 5);
        assert!(logs_contain("Job failed"));
        assert!(!summary.is_success());
    }

    // Scenario: GROUP BY configured without an explicit column list.
    // Expected Outcome: a configuration error before any connection is opened.
    #[traced_test]
    #[tokio::test]
    async fn group_by_without_columns_fails_before_connecting() {
        let h = Harness::people(3);
        let cfg = config(
            2,
            "      - { source: dbo.People, dest: people, group_by: [Bucket], sort_columns: [Bucket] }\n",
        );

        let summary = h.run(&cfg).await;
        let report = &summary.jobs[0];

        assert_eq!(report.state, JobState::Failed);
        assert_eq!(report.error.as_ref().map(|e| e.kind), Some("config"));
        assert_eq!(h.factory.connects(), 0);
        assert!(h.source.windows().is_empty());
        assert!(h.target.ddl().is_empty());
    }

    // Scenario: a run fails mid-way and is re-run with recreate disabled.
    // Expected Outcome: the second run inserts exactly the remaining rows; the
    // target matches a clean run with no duplicates and no gaps.
    #[traced_test]
    #[tokio::test]
    async fn rerun_resumes_from_last_committed_chunk() {
        let h = Harness::people(9);
        h.target.set_faults(InsertFaults::FailFrom(3));
        let first = config(2, "      - { source: dbo.People, dest: people, sort_columns: [Id] }\n");
        assert!(!h.run(&first).await.is_success());
        assert_eq!(h.target_ids(PEOPLE), vec![1, 2, 3, 4]);

        h.target.set_faults(InsertFaults::None);
        h.checkpoints.clear_history();
        let second = config(
            2,
            "      - { source: dbo.People, dest: people, sort_columns: [Id], recreate: false }\n",
        );
        let summary = h.run(&second).await;

        assert!(summary.is_success());
        assert_eq!(summary.jobs[0].rows_written, 5);
        assert_eq!(h.target_ids(PEOPLE), (1..=9).collect::<Vec<_>>());
        assert_eq!(
            h.checkpoints.history().last(),
            Some(&ResumePosition::FRESH)
        );

        let clean = Harness::people(9);
        clean.run(&first).await;
        assert_eq!(clean.target_ids(PEOPLE), h.target_ids(PEOPLE));
    }

    // Scenario: resuming a job whose recreate flag is still set.
    // Expected Outcome: the partially loaded table is not dropped again.
    #[tokio::test]
    async fn resume_never_recreates_target() {
        let h = Harness::people(6);
        h.target.set_faults(InsertFaults::FailFrom(2));
        let cfg = config(2, "      - { source: dbo.People, dest: people, sort_columns: [Id] }\n");
        h.run(&cfg).await;
        assert_eq!(h.target.ddl().len(), 2);

        h.target.set_faults(InsertFaults::None);
        let summary = h.run(&cfg).await;

        assert!(summary.is_success());
        assert_eq!(h.target.ddl().len(), 2);
        assert_eq!(h.target_ids(PEOPLE), (1..=6).collect::<Vec<_>>());
    }

    // Scenario: two sort columns where the first repeats across chunk boundaries.
    // Expected Outcome:
    // - Every chunk after the first starts strictly after the previous checkpoint.
    // - Checkpointed (sort, unique) pairs strictly increase.
    // - All rows arrive once, in order.
    #[traced_test]
    #[tokio::test]
    async fn keyset_pages_strictly_increase() {
        let h = Harness::people(8);
        let cfg = config(
            2,
            "      - { source: dbo.People, dest: people, sort_columns: [Bucket, Id] }\n",
        );

        let summary = h.run(&cfg).await;
        assert!(summary.is_success(), "{:?}", summary.jobs[0].error);
        assert_eq!(summary.jobs[0].mode, Some(PaginationMode::Keyset));

        let history = h.checkpoints.history();
        let pairs: Vec<(i64, i64)> = history
            .iter()
            .filter_map(|p| match p {
                ResumePosition::Keyset { sort, unique } => {
                    Some((sort.as_i64().unwrap(), unique.as_i64().unwrap()))
                }
                ResumePosition::Offset(_) => None,
            })
            .collect();
        assert_eq!(pairs, vec![(0, 2), (1, 4), (1, 6), (2, 8)]);
        assert!(pairs.windows(2).all(|w| w[0] < w[1]));

        let windows = h.source.windows();
        assert_eq!(windows[0], FetchWindow::Keyset { after: None, limit: 2 });
        for (window, checkpoint) in windows.iter().skip(1).zip(&history) {
            let FetchWindow::Keyset { after: Some((sort, unique)), .. } = window else {
                panic!("unexpected window {window:?}");
            };
            assert_eq!(
                checkpoint,
                &ResumePosition::Keyset {
                    sort: sort.clone(),
                    unique: unique.clone()
                }
            );
        }

        assert_eq!(h.target_ids(PEOPLE), (1..=8).collect::<Vec<_>>());
        assert_eq!(history.last(), Some(&ResumePosition::FRESH));
    }

    // Scenario: keyset job fails part-way and is resumed.
    // Expected Outcome: the resumed run continues after the stored pair.
    #[tokio::test]
    async fn keyset_job_resumes_after_stored_pair() {
        let h = Harness::people(7);
        h.target.set_faults(InsertFaults::FailFrom(2));
        let cfg = config(
            3,
            "      - { source: dbo.People, dest: people, sort_columns: [Bucket, Id] }\n",
        );
        let failed = h.run(&cfg).await;
        assert_eq!(
            failed.jobs[0].checkpoint,
            Some(ResumePosition::Keyset {
                sort: Value::Int(0),
                unique: Value::Int(3)
            })
        );

        h.target.set_faults(InsertFaults::None);
        let resumed = h.run(&cfg).await;

        assert!(resumed.is_success());
        assert_eq!(resumed.jobs[0].rows_written, 4);
        assert_eq!(h.target_ids(PEOPLE), (1..=7).collect::<Vec<_>>());
    }

    // Scenario: keyset job on a `datetime` sort column with sub-microsecond
    // ticks, checkpointed to a file; fails part-way, resumed by a new store
    // reading the same file.
    // Expected Outcome:
    // - The file holds the timestamp as text with nine fractional digits.
    // - The resumed run continues after that pair with no gap or duplicate.
    #[tokio::test]
    async fn temporal_keyset_resumes_from_checkpoint_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.json");
        let h = Harness::new(
            MemorySource::new(event_columns(), events(7)).with_keyset("OccurredAt", "Id"),
        );
        h.target.set_faults(InsertFaults::FailFrom(2));
        let cfg = config(
            3,
            "      - { source: dbo.Events, dest: events, sort_columns: [OccurredAt, Id] }\n",
        );

        let failed = h
            .run_with(h.context_with(Arc::new(FileCheckpointStore::new(&path))), &cfg)
            .await;
        assert!(!failed.is_success());
        let key = failed.jobs[0].key.clone().unwrap();
        assert_eq!(
            FileCheckpointStore::new(&path).get(&key).await,
            ResumePosition::Keyset {
                sort: Value::from("2024-01-01T10:00:00.003333333"),
                unique: Value::Int(3)
            }
        );

        h.target.set_faults(InsertFaults::None);
        let resumed = h
            .run_with(h.context_with(Arc::new(FileCheckpointStore::new(&path))), &cfg)
            .await;

        assert!(resumed.is_success(), "{:?}", resumed.jobs[0].error);
        assert_eq!(resumed.jobs[0].rows_written, 4);
        assert_eq!(h.target_ids("public.events"), (1..=7).collect::<Vec<_>>());
    }

    // Scenario: a stored position of the wrong kind for the job's strategy.
    // Expected Outcome: configuration error, nothing fetched.
    #[tokio::test]
    async fn mismatched_stored_position_is_config_error() {
        let h = Harness::people(4);
        let cfg = config(2, "      - { source: dbo.People, dest: people, sort_columns: [Id] }\n");
        let key = cfg.jobs()[0].validate().unwrap().key;
        h.checkpoints
            .set(
                &key,
                &ResumePosition::Keyset {
                    sort: Value::Int(1),
                    unique: Value::Int(1),
                },
            )
            .await
            .unwrap();

        let summary = h.run(&cfg).await;

        assert_eq!(summary.jobs[0].error.as_ref().map(|e| e.kind), Some("config"));
        assert!(h.source.windows().is_empty());
    }

    // Scenario: transient failures on both sides, fewer than the retry budget.
    // Expected Outcome: retries absorb them and every row lands once.
    #[traced_test]
    #[tokio::test]
    async fn transient_failures_are_retried() {
        let h = Harness::people(5);
        h.source.fail_next_fetches(2);
        h.target.set_faults(InsertFaults::Flaky(2));
        let cfg = config(2, "      - { source: dbo.People, dest: people, sort_columns: [Id] }\n");

        let summary = h.run(&cfg).await;

        assert!(summary.is_success(), "{:?}", summary.jobs[0].error);
        assert_eq!(h.target_ids(PEOPLE), vec![1, 2, 3, 4, 5]);
        assert!(logs_contain("Retrying after failure"));
    }

    // Scenario: built-in transforms configured on the job.
    // Expected Outcome: rows are trimmed and column names normalized in the target.
    #[tokio::test]
    async fn transforms_run_before_load() {
        let h = Harness::people(2);
        let cfg = config(
            10,
            "      - { source: dbo.People, dest: people, sort_columns: [Id], transforms: { plugins: [builtin.trim_strings] } }\n",
        );

        assert!(h.run(&cfg).await.is_success());

        let rows = h.target.rows(PEOPLE);
        assert_eq!(rows[0].columns(), vec!["id", "bucket", "full_name"]);
        assert_eq!(rows[1].get_value("full_name"), Value::from("person 2"));
        assert!(h.target.ddl()[1].contains("\"full_name\" varchar(40)"));
    }

    // Scenario: a transform reference that is not registered.
    // Expected Outcome: plugin resolution error; no connection, no rows.
    #[tokio::test]
    async fn unknown_transform_aborts_job() {
        let h = Harness::people(2);
        let cfg = config(
            10,
            "      - { source: dbo.People, dest: people, sort_columns: [Id], transforms: { plugins: [acme.scrub] } }\n",
        );

        let summary = h.run(&cfg).await;

        assert_eq!(
            summary.jobs[0].error.as_ref().map(|e| e.kind),
            Some("plugin_resolution")
        );
        assert_eq!(h.factory.connects(), 0);
        assert!(h.target.rows(PEOPLE).is_empty());
    }

    // Scenario: pre and post schema scripts around the table replacement.
    // Expected Outcome: both scripts run, in order, around the DDL.
    #[tokio::test]
    async fn schema_scripts_wrap_ddl() {
        let dir = tempfile::tempdir().unwrap();
        let pre = dir.path().join("pre.sql");
        let post = dir.path().join("post.sql");
        std::fs::write(&pre, "CREATE SCHEMA IF NOT EXISTS public;").unwrap();
        std::fs::write(&post, "CREATE INDEX ON public.people (id);").unwrap();

        let h = Harness::people(1);
        let cfg = config(
            10,
            &format!(
                "      - {{ source: dbo.People, dest: people, pre_ddl_file: '{}', post_ddl_file: '{}' }}\n",
                pre.display(),
                post.display()
            ),
        );

        assert!(h.run(&cfg).await.is_success());
        assert_eq!(
            h.target.scripts(),
            vec![
                "CREATE SCHEMA IF NOT EXISTS public;".to_string(),
                "CREATE INDEX ON public.people (id);".to_string()
            ]
        );
    }

    // Scenario: abort_run with a failing job in the first of two groups.
    // Expected Outcome: the second group never starts.
    #[tokio::test]
    async fn abort_run_cancels_later_groups() {
        let h = Harness::people(3);
        let mut cfg = config_with_policy(
            2,
            FailurePolicy::AbortRun,
            "      - { source: dbo.People, dest: broken, sort_columns: [Id], transforms: { plugins: [acme.missing] } }\n",
        );
        let mut second = cfg.databases[0].clone();
        second.name = "crm2".into();
        second.tables[0].dest = "people".into();
        second.tables[0].transforms.plugins.clear();
        cfg.databases.push(second);

        let summary = h.run(&cfg).await;

        assert_eq!(summary.jobs.len(), 2);
        assert_eq!(summary.jobs[1].error.as_ref().map(|e| e.kind), Some("cancelled"));
        assert!(h.target.rows(PEOPLE).is_empty());
    }

    // Scenario: abort_group with one job failing in Init while its sibling is
    // still opening connections.
    // Expected Outcome: the sibling stops before schema setup, so no table
    // is dropped or created and nothing is written.
    #[traced_test]
    #[tokio::test]
    async fn abort_group_stops_sibling_before_schema_setup() {
        let h = Harness::people(3).with_connect_delay(Duration::from_millis(200));
        let cfg = config_with_policy(
            2,
            FailurePolicy::AbortGroup,
            "      - { source: dbo.People, dest: broken, sort_columns: [Id], transforms: { plugins: [acme.missing] } }\n      - { source: dbo.People, dest: people, sort_columns: [Id] }\n",
        );

        let summary = h.run(&cfg).await;

        let sibling = summary
            .jobs
            .iter()
            .find(|job| job.label.contains("people"))
            .unwrap();
        assert!(sibling.was_cancelled(), "{:?}", sibling.error);
        assert!(h.target.ddl().is_empty());
        assert!(h.target.rows(PEOPLE).is_empty());
        assert!(h.source.windows().is_empty());
        assert!(logs_contain("Cancelling remaining jobs in group"));
    }

    // Scenario: continue policy with the same layout.
    // Expected Outcome: the second group still runs.
    #[tokio::test]
    async fn continue_policy_runs_every_group() {
        let h = Harness::people(3);
        let mut cfg = config(
            2,
            "      - { source: dbo.People, dest: broken, sort_columns: [Id], transforms: { plugins: [acme.missing] } }\n",
        );
        let mut second = cfg.databases[0].clone();
        second.name = "crm2".into();
        second.tables[0].dest = "people".into();
        second.tables[0].transforms.plugins.clear();
        cfg.databases.push(second);

        let summary = h.run(&cfg).await;

        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(h.target_ids(PEOPLE), vec![1, 2, 3]);
    }

    // Scenario: disabled jobs and disabled groups.
    // Expected Outcome: counted as skipped, never run.
    #[tokio::test]
    async fn disabled_jobs_are_skipped() {
        let h = Harness::people(3);
        let cfg = config(
            2,
            "      - { source: dbo.People, dest: people, sort_columns: [Id], enabled: false }\n",
        );

        let summary = h.run(&cfg).await;

        assert!(summary.jobs.is_empty());
        assert_eq!(summary.skipped, 1);
        assert_eq!(h.factory.connects(), 0);
    }

    // Scenario: shutdown requested before the run starts.
    // Expected Outcome: jobs are reported cancelled and nothing is written.
    #[tokio::test]
    async fn cancelled_run_writes_nothing() {
        let h = Harness::people(3);
        let cfg = config(2, "      - { source: dbo.People, dest: people, sort_columns: [Id] }\n");
        let ctx = h.context();
        ctx.cancel.cancel();

        let summary = h.run_with(ctx, &cfg).await;

        assert!(summary.jobs[0].was_cancelled());
        assert!(h.checkpoints.history().is_empty());
    }

    // Scenario: offset job against a real checkpoint file.
    // Expected Outcome: the file ends with the job's key reset to 0.
    #[tokio::test]
    async fn checkpoint_file_is_reset_on_completion() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCheckpointStore::new(dir.path().join("cp.json")));
        let h = Harness::new(MemorySource::new(people_columns(), people(4)));
        let cfg = config(3, "      - { source: dbo.People, dest: people, sort_columns: [Id] }\n");

        let summary = h.run_with(h.context_with(store.clone()), &cfg).await;
        assert!(summary.is_success());

        let key = summary.jobs[0].key.clone().unwrap();
        let entries = store.entries().await.unwrap();
        assert_eq!(entries.get(key.as_str()), Some(&ResumePosition::FRESH));
        assert!(!key.as_str().contains("secret"));
    }
}
