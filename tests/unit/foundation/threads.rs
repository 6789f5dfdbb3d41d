use super::*;

#[test]
fn presenter_outranks_workers_and_workers_the_loader() {
    assert!(ThreadRole::Presenter.level() > ThreadRole::Upscale.level());
    assert!(ThreadRole::Upscale.level() >= ThreadRole::Loader.level());
    for role in [ThreadRole::Loader, ThreadRole::Upscale, ThreadRole::Presenter] {
        assert!(role.priority().is_some(), "{role:?} has no priority");
    }
}

#[test]
fn spawned_thread_runs_even_when_priority_is_refused() {
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = spawn_pinned("p3a-test", ThreadRole::Presenter, None, move || {
        tx.send(thread::current().name().map(str::to_string)).unwrap();
    })
    .unwrap();
    handle.join().unwrap();
    assert_eq!(rx.recv().unwrap().as_deref(), Some("p3a-test"));
}
