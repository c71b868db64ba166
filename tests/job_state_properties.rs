//! Property tests for the job state machine.
//!
//! Random trees of body-less jobs are driven through random cancel/complete
//! sequences; after every step the flag and structure invariants must hold.

#[macro_use]
mod common;

use common::*;
use cojob::{JobHandle, JobState};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Cancel(usize),
    Complete(usize),
}

fn op_strategy(jobs: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..jobs).prop_map(Op::Cancel),
        (0..jobs).prop_map(Op::Complete),
    ]
}

/// Parent index for each job; job 0 is the tree root, job `i` picks a parent
/// among `0..i`.
fn tree_strategy() -> impl Strategy<Value = Vec<usize>> {
    (2usize..12).prop_flat_map(|n| {
        (1..n)
            .map(|i| (0..i).boxed())
            .collect::<Vec<_>>()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Flags {
    active: bool,
    completed: bool,
    cancelled: bool,
}

fn flags(job: &JobHandle) -> Flags {
    Flags {
        active: job.is_active(),
        completed: job.is_completed(),
        cancelled: job.is_cancelled(),
    }
}

fn check_invariants(jobs: &[JobHandle], parents: &[usize], before: &[Flags]) {
    for (i, job) in jobs.iter().enumerate() {
        let now = flags(job);
        assert!(!(now.completed && now.active), "job {i}: completed implies inactive");
        assert_eq!(now.active, job.state() == JobState::Active);
        if before[i].cancelled {
            assert!(now.cancelled, "job {i}: cancelled never reverts");
        }
        if before[i].completed {
            assert!(now.completed, "job {i}: completed is terminal");
        }
        if now.completed {
            for (child, parent) in parents.iter().enumerate() {
                if *parent == i {
                    assert!(
                        jobs[child + 1].is_completed(),
                        "job {i} completed before its child {}",
                        child + 1
                    );
                }
            }
        }
        if i > 0 && jobs[parents[i - 1]].is_cancelled() {
            assert!(
                now.cancelled || now.completed,
                "job {i}: parent cancelled but the child was left running"
            );
        }
    }
}

#[test]
fn cancel_after_complete_is_ignored() {
    test_phase!("cancel_after_complete_is_ignored");
    let (rt, sink) = capturing_runtime();
    rt.block_on(|cx| async move {
        let top = cx.standalone_job();
        let leaf = cx.job_builder().parent(&top).standalone();
        let sibling = cx.job_builder().parent(&top).standalone();
        assert!(leaf.complete());
        assert!(leaf.is_completed());

        let changed = leaf.cancel();
        assert_with_log!(!changed, "cancel of a completed job", false, changed);
        assert!(leaf.is_completed() && !leaf.is_cancelled());

        assert!(top.cancel());
        assert!(sibling.is_cancelled() && sibling.is_completed());
        assert!(!leaf.is_cancelled(), "completed child keeps its outcome");
        Ok(())
    })
    .expect("root completes");
    assert!(sink.is_empty());
    test_complete!("cancel_after_complete_is_ignored");
}

#[test]
fn cancelling_a_deep_chain_completes_every_link() {
    test_phase!("cancelling_a_deep_chain_completes_every_link");
    let (rt, sink) = capturing_runtime();
    let depth = 50_000;
    rt.block_on(move |cx| async move {
        let top = cx.standalone_job();
        let mut chain = Vec::with_capacity(depth);
        let mut parent = top.clone();
        for _ in 0..depth {
            parent = cx.job_builder().parent(&parent).standalone();
            chain.push(parent.clone());
        }
        assert!(top.cancel());
        assert!(top.is_completed());
        let done = chain.iter().filter(|job| job.is_cancelled() && job.is_completed()).count();
        assert_with_log!(done == depth, "every link cancelled and completed", depth, done);
        Ok(())
    })
    .expect("root completes");
    assert!(sink.is_empty());
    assert_eq!(rt.live_jobs(), 0);
    test_complete!("cancelling_a_deep_chain_completes_every_link", depth = depth);
}

proptest! {
    #![proptest_config(test_proptest_config(64))]

    #[test]
    fn random_cancel_and_complete_keep_invariants(
        parents in tree_strategy(),
        ops in prop::collection::vec(op_strategy(12), 1..40),
    ) {
        init_test_logging();
        let (rt, sink) = capturing_runtime();
        let parents_for_body = parents.clone();
        let ops_for_body = ops.clone();
        rt.block_on(move |cx| async move {
            let mut jobs = vec![cx.standalone_job()];
            for parent in &parents_for_body {
                let job = cx.job_builder().parent(&jobs[*parent]).standalone();
                jobs.push(job);
            }
            let n = jobs.len();
            for op in ops_for_body {
                let before: Vec<Flags> = jobs.iter().map(flags).collect();
                match op {
                    Op::Cancel(i) => {
                        let i = i % n;
                        let had_reason = before[i].cancelled || before[i].completed;
                        let changed = jobs[i].cancel();
                        assert_with_log!(
                            changed != had_reason,
                            "cancel reports whether it changed state",
                            !had_reason,
                            changed
                        );
                        let after = flags(&jobs[i]);
                        assert!(!after.active, "job {i}: active after cancel");
                        if changed {
                            assert!(after.cancelled, "job {i}: cancel took effect");
                        } else {
                            assert_eq!(after, before[i], "job {i}: ignored cancel changed flags");
                            assert!(after.cancelled || after.completed);
                        }
                    }
                    Op::Complete(i) => {
                        let i = i % n;
                        jobs[i].complete();
                    }
                }
                check_invariants(&jobs, &parents_for_body, &before);
            }
            Ok(())
        })
        .expect("root completes");
        prop_assert!(sink.is_empty());
    }

    #[test]
    fn cancelled_coroutines_always_complete(
        yields in prop::collection::vec(0u8..4, 1..8),
        cancel_mask in any::<u8>(),
    ) {
        let (rt, sink) = capturing_runtime();
        let expected = yields.clone();
        let (handles, cancelled) = rt
            .block_on(move |cx| async move {
                let mut handles = Vec::new();
                for count in expected {
                    handles.push(cx.launch(move |cx| async move {
                        for _ in 0..count {
                            cx.yield_now().await?;
                        }
                        Ok(())
                    }));
                }
                cx.yield_now().await?;
                let mut cancelled = Vec::new();
                for (i, job) in handles.iter().enumerate() {
                    if cancel_mask & (1 << i) != 0 {
                        cancelled.push(job.cancel());
                    } else {
                        cancelled.push(false);
                    }
                }
                for job in &handles {
                    cx.join(job).await?;
                }
                Ok((handles, cancelled))
            })
            .expect("root completes");
        for (job, newly) in handles.iter().zip(&cancelled) {
            prop_assert!(job.is_completed());
            if *newly {
                prop_assert!(job.is_cancelled());
            }
        }
        drop(handles);
        prop_assert_eq!(rt.live_jobs(), 0);
        prop_assert!(sink.is_empty());
    }
}
