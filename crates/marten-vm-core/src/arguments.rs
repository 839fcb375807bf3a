//! Arguments exotic object
//!
//! The sloppy-mode variant aliases indexed slots to the mapped formal
//! parameters through the same capture cells the frame uses, until either
//! side is redefined as a non-writable data property. The strict variant has
//! no mapping and poisons `callee`/`caller`.

use marten_vm_gc::GcRef;
use std::cell::RefCell;

use crate::atom::atoms;
use crate::context::Context;
use crate::object::{JsObject, ObjectKind};
use crate::property::{Property, PropertyDescriptor, PropertyKey};
use crate::value::{CaptureCell, Value};

/// Internal slots of an arguments object.
#[derive(Debug, Default)]
pub struct ArgumentsData {
    /// Index → shared parameter cell; `None` once the alias is severed.
    mappings: RefCell<Vec<Option<CaptureCell>>>,
}

impl ArgumentsData {
    /// Value from the parameter mapping, if index `i` is still aliased.
    pub fn mapped_value(&self, i: u32) -> Option<Value> {
        self.mappings
            .borrow()
            .get(i as usize)
            .and_then(|c| c.as_ref())
            .map(|cell| cell.get())
    }

    /// Write through the alias. Returns false when the index is unmapped.
    pub fn set_mapped(&self, i: u32, value: &Value) -> bool {
        match self.mappings.borrow().get(i as usize).and_then(|c| c.as_ref()) {
            Some(cell) => {
                cell.set(value.clone());
                true
            }
            None => false,
        }
    }

    /// Sever the alias for index `i`.
    pub fn sever(&self, i: u32) {
        if let Some(slot) = self.mappings.borrow_mut().get_mut(i as usize) {
            *slot = None;
        }
    }

    /// Mapping maintenance for `[[DefineOwnProperty]]`: redefining as an
    /// accessor or as non-writable data severs the alias; a plain value
    /// change writes through first.
    pub fn on_define(&self, i: u32, desc: &PropertyDescriptor) {
        if desc.is_accessor() {
            self.sever(i);
            return;
        }
        if let Some(value) = &desc.value {
            self.set_mapped(i, value);
        }
        if desc.writable == Some(false) {
            self.sever(i);
        }
    }
}

/// Create a sloppy-mode arguments object aliasing `cells` for the first
/// `cells.len()` indices.
pub fn create_mapped(
    cx: &mut Context,
    values: &[Value],
    cells: Vec<Option<CaptureCell>>,
    callee: Value,
) -> GcRef<JsObject> {
    let proto = cx.intrinsics().object_prototype.clone();
    let data = ArgumentsData {
        mappings: RefCell::new(cells),
    };
    let obj = JsObject::new(ObjectKind::Arguments(data), Some(proto));
    populate(cx, &obj, values);
    obj.insert_property(
        PropertyKey::Atom(atoms::CALLEE),
        Property::data_with(callee, true, false, true),
    );
    obj
}

/// Create a strict-mode arguments object: no mapping, and `callee`/`caller`
/// are accessors that throw.
pub fn create_unmapped(cx: &mut Context, values: &[Value]) -> GcRef<JsObject> {
    let proto = cx.intrinsics().object_prototype.clone();
    let obj = JsObject::new(ObjectKind::Arguments(ArgumentsData::default()), Some(proto));
    populate(cx, &obj, values);

    let poison = cx.intrinsics().throw_type_error.clone();
    for key in [atoms::CALLEE, atoms::CALLER] {
        obj.insert_property(
            PropertyKey::Atom(key),
            Property::Accessor {
                get: Some(Value::Object(poison.clone())),
                set: Some(Value::Object(poison.clone())),
                enumerable: false,
                configurable: false,
            },
        );
    }
    obj
}

fn populate(cx: &mut Context, obj: &GcRef<JsObject>, values: &[Value]) {
    for (i, value) in values.iter().enumerate() {
        obj.insert_property(PropertyKey::Index(i as u32), Property::data(value.clone()));
    }
    obj.insert_property(
        PropertyKey::Atom(atoms::LENGTH),
        Property::data_with(Value::number(values.len() as f64), true, false, true),
    );
    let iterator_sym = cx.well_known().iterator.clone();
    let array_values = cx.intrinsics().array_values_fn.clone();
    obj.insert_property(
        PropertyKey::Symbol(iterator_sym),
        Property::method(Value::Object(array_values)),
    );
}
