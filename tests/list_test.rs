mod common;

use common::{setup_test_config_dir, write_csv};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use gridlist::{
    AppConfig, DataSource, FileStore, Filter, GenericList, GridInput, ListEvent, StorageKeys,
};
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use serde_json::Value;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn key(code: KeyCode) -> GridInput {
    GridInput::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn shift(code: KeyCode) -> GridInput {
    GridInput::Key(KeyEvent::new(code, KeyModifiers::SHIFT))
}

fn open_list(source: &DataSource, store: &FileStore) -> GenericList<Value> {
    let mut config = AppConfig::default();
    config.display.page_size = 4;
    let mut list = GenericList::new(
        source.schema(),
        Box::new(store.clone()),
        StorageKeys::for_view("orders"),
        &config,
    );
    let page = source.fetch_page(&Filter::default(), 1, 4).unwrap();
    list.set_data(page.rows, page.total);
    list
}

fn screen(list: &mut GenericList<Value>, width: u16, height: u16) -> String {
    let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
    terminal
        .draw(|frame| frame.render_widget(&mut *list, frame.area()))
        .unwrap();
    terminal
        .backend()
        .buffer()
        .content()
        .iter()
        .map(|c| c.symbol())
        .collect()
}

#[test]
fn test_renders_headers_rows_and_footer() {
    let (_config_dir, _config, store) = setup_test_config_dir();
    let dir = TempDir::new().unwrap();
    let source = DataSource::open(&write_csv(dir.path(), "orders.csv"), None).unwrap();
    let mut list = open_list(&source, &store);

    let text = screen(&mut list, 160, 12);
    assert!(text.contains("name"));
    assert!(text.contains("city"));
    assert!(text.contains("order_01"));
    assert!(text.contains("Page 1/3"));
    assert!(list.failure().is_none());
}

#[test]
fn test_keyboard_customization_persists_across_lists() {
    let (_config_dir, _config, store) = setup_test_config_dir();
    let dir = TempDir::new().unwrap();
    let source = DataSource::open(&write_csv(dir.path(), "orders.csv"), None).unwrap();
    let now = Instant::now();
    {
        let mut list = open_list(&source, &store);
        screen(&mut list, 160, 12);
        list.handle_event(&key(KeyCode::Char('c')), now);
        // Focus "name", move it right past "amount", then hide "id"
        list.handle_event(&key(KeyCode::Right), now);
        list.handle_event(&shift(KeyCode::Right), now);
        list.handle_event(&key(KeyCode::Left), now);
        list.handle_event(&key(KeyCode::Left), now);
        list.handle_event(&key(KeyCode::Char(' ')), now);
        list.handle_event(&key(KeyCode::Char('c')), now);
        assert_eq!(
            list.columns().order(),
            ["id", "amount", "name", "status", "customer.city", "customer.tier"]
        );
    }

    let list = open_list(&source, &store);
    assert_eq!(
        list.columns().order(),
        ["id", "amount", "name", "status", "customer.city", "customer.tier"]
    );
    assert!(!list.columns().is_visible("id"));
}

#[test]
fn test_debounced_search_emits_one_filter_change() {
    let (_config_dir, _config, store) = setup_test_config_dir();
    let dir = TempDir::new().unwrap();
    let source = DataSource::open(&write_csv(dir.path(), "orders.csv"), None).unwrap();
    let mut list = open_list(&source, &store);
    let start = Instant::now();

    list.handle_event(&key(KeyCode::Char('/')), start);
    for (i, c) in "Rome".chars().enumerate() {
        let at = start + Duration::from_millis(50 * i as u64);
        assert_eq!(list.handle_event(&key(KeyCode::Char(c)), at), None);
        assert_eq!(list.tick(at), None);
    }
    let event = list.tick(start + Duration::from_millis(150 + 300));
    let Some(ListEvent::FilterChange(filter)) = event else {
        panic!("expected a filter change, got {event:?}");
    };
    assert_eq!(filter.search, "Rome");
    assert_eq!(list.tick(start + Duration::from_secs(5)), None);

    let page = source.fetch_page(&filter, 1, 4).unwrap();
    assert_eq!(page.total, 4);
}
