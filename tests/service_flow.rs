use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use test_log::test;
use wmserver::actor::controller::Collaborators;
use wmserver::actor::service::WindowManagerService;
use wmserver::common::config::Config;
use wmserver::ipc::{self, WmRequest};
use wmserver::model::error::WmError;
use wmserver::model::types::{DisplayId, WindowId, WindowMode, WindowType};
use wmserver::model::window_property::WindowProperty;
use wmserver::sys::client::{RecordingManagerAgent, WindowManagerAgentType};
use wmserver::sys::render::{InMemoryRenderService, RenderService};

fn config() -> Config {
    let mut config = Config::default();
    config.settings.window_animation_sentinel = PathBuf::from("/nonexistent/wmserver/sentinel");
    config
}

fn start(config: &Config) -> (WindowManagerService, Arc<InMemoryRenderService>) {
    let render = InMemoryRenderService::new();
    let collaborators = Collaborators {
        render: render.clone(),
        ..Collaborators::headless()
    };
    (WindowManagerService::start(config, collaborators).unwrap(), render)
}

fn show(
    service: &WindowManagerService,
    render: &InMemoryRenderService,
    name: &str,
    mode: WindowMode,
) -> WindowId {
    let mut property = WindowProperty::new(name, WindowType::AppMainWindow);
    property.set_mode(mode);
    let surface = render.create_surface(name);
    let id = service.create_window(None, property, Some(surface), 100, 1000).unwrap();
    service.add_window(id).unwrap();
    id
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[test]
fn split_pair_gets_a_divider_from_the_inner_manager() {
    let (service, render) = start(&config());
    show(&service, &render, "primary", WindowMode::SplitPrimary);
    show(&service, &render, "secondary", WindowMode::SplitSecondary);

    assert!(wait_until(|| {
        service.divider_of(DisplayId::DEFAULT).is_some()
            && service.placeholder_of(DisplayId::DEFAULT).is_none()
    }));
    let table = service.dump(vec!["-a".to_string()]).unwrap();
    assert!(table.contains("divider_0"), "{table}");
}

#[test]
fn focus_changes_reach_registered_agents() {
    let (service, render) = start(&config());
    let observer = Arc::new(RecordingManagerAgent::default());
    service.agents().register_agent(WindowManagerAgentType::Focus, observer.clone()).unwrap();

    let first = show(&service, &render, "first", WindowMode::Floating);
    let second = show(&service, &render, "second", WindowMode::Floating);

    let focus = observer.focus_events();
    assert!(focus.contains(&(first, true)), "{focus:?}");
    assert!(focus.contains(&(first, false)), "{focus:?}");
    assert_eq!(focus.last(), Some(&(second, true)));
}

#[test]
fn snapshot_waits_a_bounded_time() {
    let mut config = config();
    config.settings.snapshot_timeout_ms = 50;
    let (service, render) = start(&config);
    let id = show(&service, &render, "app", WindowMode::Floating);

    let shot = service.snapshot(id).unwrap();
    assert_eq!((shot.width, shot.height), (810, 1755));

    render.set_snapshots_disabled(true);
    assert_eq!(service.snapshot(id), Err(WmError::Timeout));
    assert_eq!(service.snapshot(WindowId(99)), Err(WmError::InvalidWindow));
}

#[test]
fn requests_after_shutdown_fail() {
    let (mut service, render) = start(&config());
    let id = show(&service, &render, "app", WindowMode::Floating);
    service.shutdown();
    assert_eq!(service.remove_window(id), Err(WmError::DestroyedObject));
}

#[test]
fn script_requests_run_in_order() {
    let (service, render) = start(&config());
    let script = r#"[
        create_window(property: (name: "notes", window_type: app_main_window, mode: floating), pid: 5),
        add_window(window: WindowId(1)),
        set_window_mode(window: WindowId(1), mode: floating),
        remove_window(window: WindowId(7)),
        remote_died(pid: 5),
    ]"#;
    let codes: Vec<i32> = ipc::parse_script(script)
        .unwrap()
        .into_iter()
        .map(|request: WmRequest| ipc::handle(&service, &*render, request).code)
        .collect();
    // ok, ok, do nothing, invalid window, ok
    assert_eq!(codes, vec![0, 0, 1, 4, 0]);
}
