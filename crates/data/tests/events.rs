//! Integration tests for change events and tree options.

use cambium_core::schema::{Expr, SchemaBuilder};
use cambium_core::{ColumnId, DataType, ModelId, Value};
use cambium_data::{DataEvent, DataTree, DataTreeOptions, EventKind};
use std::cell::RefCell;
use std::rc::Rc;

struct Fixture {
    tree: DataTree,
    line: ModelId,
    qty: ColumnId,
    double: ColumnId,
    total: ColumnId,
    seen: Rc<RefCell<Vec<DataEvent>>>,
}

/// order(total = sum(line.double)) -> line(qty, double = qty * 2)
fn fixture(options: DataTreeOptions) -> Fixture {
    let mut b = SchemaBuilder::new("order").unwrap();
    let line = b.add_child_model(0, "line").unwrap();
    let qty = b.add_column(line, "qty", DataType::Int32).unwrap();
    let double = b
        .add_expression(line, "double", DataType::Int32, Expr::mul(Expr::column(qty), Expr::literal(2i32)))
        .unwrap();
    let total = b
        .add_expression(0, "total", DataType::Int64, Expr::sum(double))
        .unwrap();
    let mut tree = DataTree::with_options(Rc::new(b.build().unwrap()), options);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    tree.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    Fixture {
        tree,
        line,
        qty,
        double,
        total,
        seen,
    }
}

#[test]
fn test_insert_and_remove_events() {
    let mut f = fixture(DataTreeOptions::default());
    let root = f.tree.root_data_set();
    let order = f.tree.append_row(root).unwrap();
    let lines = f.tree.child_data_set(order, f.line).unwrap();
    let line = f.tree.append_row(lines).unwrap();
    f.tree.remove_row(line).unwrap();

    let seen = f.seen.borrow();
    assert_eq!(
        seen.as_slice(),
        &[
            DataEvent::RowInserted {
                data_set: root,
                row: order,
                index: 0
            },
            DataEvent::RowInserted {
                data_set: lines,
                row: line,
                index: 0
            },
            DataEvent::RowRemoved {
                data_set: lines,
                row: line,
                index: 0
            },
        ]
    );
}

#[test]
fn test_events_held_until_flush() {
    let mut f = fixture(DataTreeOptions::default());
    let root = f.tree.root_data_set();
    let order = f.tree.append_row(root).unwrap();
    let lines = f.tree.child_data_set(order, f.line).unwrap();
    let line = f.tree.append_row(lines).unwrap();
    f.seen.borrow_mut().clear();
    f.tree.reset_stats();

    f.tree.suspend_computation();
    for n in 1..=5 {
        f.tree.set_value(line, f.qty, Value::Int32(n)).unwrap();
    }
    assert!(f.seen.borrow().is_empty());
    f.tree.resume_computation().unwrap();

    assert_eq!(f.tree.get_value(order, f.total).unwrap(), Value::Int64(10));
    let seen = f.seen.borrow();
    assert_eq!(
        seen.as_slice(),
        &[
            DataEvent::ValueChanged {
                row: line,
                columns: vec![f.qty, f.double]
            },
            DataEvent::ValueChanged {
                row: order,
                columns: vec![f.total]
            },
        ]
    );
    // Raised before coalescing: five writes, one double, one total.
    assert_eq!(f.tree.stats().events(), 7);
}

#[test]
fn test_unbatched_events_dispatch_immediately() {
    let mut f = fixture(DataTreeOptions::new().batch_events(false));
    let root = f.tree.root_data_set();
    let order = f.tree.append_row(root).unwrap();
    let lines = f.tree.child_data_set(order, f.line).unwrap();
    let line = f.tree.append_row(lines).unwrap();
    f.seen.borrow_mut().clear();

    f.tree.suspend_computation();
    f.tree.set_value(line, f.qty, Value::Int32(1)).unwrap();
    f.tree.set_value(line, f.qty, Value::Int32(2)).unwrap();
    assert_eq!(f.seen.borrow().len(), 2);
    f.tree.resume_computation().unwrap();

    assert_eq!(f.seen.borrow().len(), 4);
    assert_eq!(f.tree.get_value(line, f.double).unwrap(), Value::Int32(4));
}

#[test]
fn test_equal_writes_skipped_by_default() {
    let mut f = fixture(DataTreeOptions::default());
    let root = f.tree.root_data_set();
    let order = f.tree.append_row(root).unwrap();
    let lines = f.tree.child_data_set(order, f.line).unwrap();
    let line = f.tree.append_row(lines).unwrap();
    f.tree.set_value(line, f.qty, Value::Int32(3)).unwrap();
    let version = f.tree.version(line).unwrap();
    f.seen.borrow_mut().clear();

    f.tree.set_value(line, f.qty, Value::Int32(3)).unwrap();
    assert_eq!(f.tree.version(line).unwrap(), version);
    assert!(f.seen.borrow().is_empty());
}

#[test]
fn test_equal_writes_reported_when_not_skipped() {
    let mut f = fixture(DataTreeOptions::new().skip_unchanged_writes(false));
    let root = f.tree.root_data_set();
    let order = f.tree.append_row(root).unwrap();
    let lines = f.tree.child_data_set(order, f.line).unwrap();
    let line = f.tree.append_row(lines).unwrap();
    f.tree.set_value(line, f.qty, Value::Int32(3)).unwrap();
    let version = f.tree.version(line).unwrap();
    f.seen.borrow_mut().clear();

    f.tree.set_value(line, f.qty, Value::Int32(3)).unwrap();
    assert!(f.tree.version(line).unwrap() > version);
    assert!(!f.seen.borrow().is_empty());
}

#[test]
fn test_kind_filter_and_unsubscribe() {
    let mut f = fixture(DataTreeOptions::default());
    let removed = Rc::new(RefCell::new(0));
    let counter = removed.clone();
    let id = f
        .tree
        .subscribe_kind(EventKind::RowRemoved, move |_| *counter.borrow_mut() += 1);

    let root = f.tree.root_data_set();
    let a = f.tree.append_row(root).unwrap();
    let b = f.tree.append_row(root).unwrap();
    f.tree.remove_row(a).unwrap();
    assert_eq!(*removed.borrow(), 1);

    assert_eq!(f.tree.subscriber_count(), 2);
    assert!(f.tree.unsubscribe(id));
    assert_eq!(f.tree.subscriber_count(), 1);
    f.tree.remove_row(b).unwrap();
    assert_eq!(*removed.borrow(), 1);
    assert!(!f.tree.unsubscribe(id));
}

#[test]
fn test_add_commit_reports_insert_then_values() {
    let mut f = fixture(DataTreeOptions::default());
    let root = f.tree.root_data_set();
    let order = f.tree.append_row(root).unwrap();
    let lines = f.tree.child_data_set(order, f.line).unwrap();
    f.seen.borrow_mut().clear();

    let line = f.tree.begin_add(lines).unwrap();
    f.tree.set_value(line, f.qty, Value::Int32(4)).unwrap();
    assert!(f.seen.borrow().is_empty());
    f.tree.commit_edit(line).unwrap();

    let kinds: Vec<EventKind> = f.seen.borrow().iter().map(|e| e.kind()).collect();
    assert_eq!(
        kinds,
        vec![EventKind::RowInserted, EventKind::ValueChanged, EventKind::ValueChanged]
    );
    assert_eq!(f.tree.get_value(order, f.total).unwrap(), Value::Int64(8));
}
