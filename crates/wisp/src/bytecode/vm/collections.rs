//! Struct/instance, enum, list, map, and closure/native construction opcodes.
//!
//! `Class`/`AddProp` build a struct template on the stack one property at a
//! time (clox's "template stays on stack" pattern); `Instance` stamps out a
//! fresh, fully independent instance by cloning that template's property
//! table, which is why no runtime superclass link is needed (§4.4: every
//! subclass's `Class`/`AddProp` sequence already merges in its ancestor's
//! properties at compile time).

use crate::{
    errors::RuntimeError,
    io::PrintWriter,
    natives::NativeId,
    object::{Obj, ObjClosure, ObjEnum, ObjInstance, ObjList, ObjMap, ObjNative, ObjStruct},
    table::Table,
    value::Value,
};

use super::VM;

fn int_index(value: Value) -> Result<usize, RuntimeError> {
    match value {
        Value::Int(n) if n >= 0 => Ok(n as usize),
        Value::Int(n) => Err(RuntimeError::BadIndex {
            message: format!("negative index {n}"),
        }),
        _ => Err(RuntimeError::Internal {
            message: "index must be an int".to_owned(),
        }),
    }
}

fn not_object(what: &str) -> RuntimeError {
    RuntimeError::Internal {
        message: format!("{what} is not an object"),
    }
}

enum Indexed {
    Value(Value),
    Byte(u8),
}

impl<P: PrintWriter> VM<P> {
    pub(super) fn exec_fun(&mut self, const_idx: u16) -> Result<(), RuntimeError> {
        let function_id = self.object_const(const_idx);
        let count = self.read_byte() as usize;
        let base = self.current_frame().stack_base;
        let enclosing_closure = self.current_frame().closure;
        let mut upvalues = Vec::with_capacity(count);
        for _ in 0..count {
            let is_local = self.read_byte() != 0;
            let index = self.read_byte() as usize;
            let upvalue_id = if is_local {
                self.capture_upvalue(base + index)
            } else {
                match self.heap.get(enclosing_closure) {
                    Obj::Closure(c) => c.upvalues[index],
                    _ => unreachable!("enclosing frame closure is not a closure"),
                }
            };
            upvalues.push(upvalue_id);
        }
        self.maybe_collect();
        let closure_id = self.heap.allocate(Obj::Closure(ObjClosure {
            function: function_id,
            upvalues,
        }));
        self.push(Value::Object(closure_id))
    }

    pub(super) fn exec_native_value(&mut self, const_idx: u16) -> Result<(), RuntimeError> {
        let raw = match self.read_const(const_idx) {
            Value::Int(n) => n,
            _ => unreachable!("native constant is not an int"),
        };
        let id = u8::try_from(raw)
            .ok()
            .and_then(NativeId::from_u8)
            .ok_or_else(|| RuntimeError::Internal {
                message: format!("unknown native id {raw}"),
            })?;
        self.maybe_collect();
        let native_id = self.heap.allocate(Obj::Native(ObjNative { id }));
        self.push(Value::Object(native_id))
    }

    pub(super) fn exec_class(&mut self, name_idx: u16) -> Result<(), RuntimeError> {
        let name = self.object_const(name_idx);
        self.maybe_collect();
        let struct_id = self.heap.allocate(Obj::Struct(ObjStruct { name, props: Table::new() }));
        self.push(Value::Object(struct_id))
    }

    pub(super) fn exec_add_prop(&mut self, name_idx: u16) -> Result<(), RuntimeError> {
        let name = self.object_const(name_idx);
        let hash = self.string_hash(name);
        let value = self.pop();
        let struct_id = self.peek(0).as_object().ok_or_else(|| not_object("ADD_PROP target"))?;
        match self.heap.get_mut(struct_id) {
            Obj::Struct(s) => {
                s.props.insert(name, hash, value);
                Ok(())
            }
            _ => Err(RuntimeError::Internal {
                message: "ADD_PROP target is not a struct".to_owned(),
            }),
        }
    }

    pub(super) fn exec_enum(&mut self, name_idx: u16) -> Result<(), RuntimeError> {
        let name = self.object_const(name_idx);
        let count = self.read_u16();
        let mut variants = Table::new();
        for ordinal in 0..i32::from(count) {
            let variant_idx = self.read_u16();
            let variant_name = self.object_const(variant_idx);
            let hash = self.string_hash(variant_name);
            variants.insert(variant_name, hash, ordinal);
        }
        self.maybe_collect();
        let enum_id = self.heap.allocate(Obj::Enum(ObjEnum { name, variants }));
        self.push(Value::Object(enum_id))
    }

    pub(super) fn exec_instance(&mut self) -> Result<(), RuntimeError> {
        let template = self.pop();
        let struct_id = template.as_object().ok_or_else(|| not_object("INSTANCE target"))?;
        let props = match self.heap.get(struct_id) {
            Obj::Struct(s) => s.props.clone(),
            _ => {
                return Err(RuntimeError::Internal {
                    message: "INSTANCE target is not a struct".to_owned(),
                });
            }
        };
        self.maybe_collect();
        let instance_id = self.heap.allocate(Obj::Instance(ObjInstance { struct_id, props }));
        self.push(Value::Object(instance_id))
    }

    pub(super) fn exec_get_prop(&mut self, name_idx: u16) -> Result<(), RuntimeError> {
        let name = self.object_const(name_idx);
        let hash = self.string_hash(name);
        let object = self.pop();
        let obj_id = object.as_object().ok_or_else(|| not_object("GET_PROP target"))?;
        let value = match self.heap.get(obj_id) {
            Obj::Instance(inst) => {
                if let Some(v) = inst.props.get(name, hash) {
                    *v
                } else {
                    let struct_id = inst.struct_id;
                    match self.heap.get(struct_id) {
                        Obj::Struct(s) => *s.props.get(name, hash).ok_or_else(|| RuntimeError::Internal {
                            message: "unknown property".to_owned(),
                        })?,
                        _ => {
                            return Err(RuntimeError::Internal {
                                message: "instance's defining struct is not a struct".to_owned(),
                            });
                        }
                    }
                }
            }
            Obj::Struct(s) => *s.props.get(name, hash).ok_or_else(|| RuntimeError::Internal {
                message: "unknown property".to_owned(),
            })?,
            Obj::Enum(e) => Value::Int(*e.variants.get(name, hash).ok_or_else(|| RuntimeError::Internal {
                message: "unknown enum variant".to_owned(),
            })?),
            _ => {
                return Err(RuntimeError::Internal {
                    message: "GET_PROP target has no properties".to_owned(),
                });
            }
        };
        self.push(value)
    }

    pub(super) fn exec_set_prop(&mut self, name_idx: u16) -> Result<(), RuntimeError> {
        let name = self.object_const(name_idx);
        let hash = self.string_hash(name);
        let value = self.pop();
        let object = self.pop();
        let obj_id = object.as_object().ok_or_else(|| not_object("SET_PROP target"))?;
        match self.heap.get_mut(obj_id) {
            Obj::Instance(inst) => {
                inst.props.insert(name, hash, value);
            }
            Obj::Struct(s) => {
                s.props.insert(name, hash, value);
            }
            _ => {
                return Err(RuntimeError::Internal {
                    message: "SET_PROP target has no properties".to_owned(),
                });
            }
        }
        self.push(value)
    }

    pub(super) fn exec_get_size(&mut self) -> Result<(), RuntimeError> {
        let object = self.pop();
        let obj_id = object.as_object().ok_or_else(|| not_object("GET_SIZE target"))?;
        let size = match self.heap.get(obj_id) {
            Obj::List(list) => list.elements.len(),
            Obj::Map(map) => map.table.len(),
            Obj::String(s) => s.bytes.len(),
            _ => {
                return Err(RuntimeError::Internal {
                    message: "GET_SIZE target has no size".to_owned(),
                });
            }
        };
        self.push(Value::Int(i32::try_from(size).unwrap_or(i32::MAX)))
    }

    pub(super) fn exec_set_size(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop();
        let object = self.pop();
        let obj_id = object.as_object().ok_or_else(|| not_object("SET_SIZE target"))?;
        let n = int_index(value)?;
        match self.heap.get_mut(obj_id) {
            Obj::List(list) => {
                if n <= list.elements.len() {
                    list.elements.truncate(n);
                } else {
                    let default = list.default;
                    list.elements.resize(n, default);
                }
            }
            Obj::Map(_) => {
                return Err(RuntimeError::Native {
                    message: "a Map's size cannot be assigned".to_owned(),
                });
            }
            _ => {
                return Err(RuntimeError::Internal {
                    message: "SET_SIZE target has no size".to_owned(),
                });
            }
        }
        self.push(value)
    }

    pub(super) fn exec_get_keys(&mut self) -> Result<(), RuntimeError> {
        let object = self.pop();
        let obj_id = object.as_object().ok_or_else(|| not_object("GET_KEYS target"))?;
        let keys: Vec<Value> = match self.heap.get(obj_id) {
            Obj::Map(m) => m.table.keys().map(Value::Object).collect(),
            _ => {
                return Err(RuntimeError::Internal {
                    message: "GET_KEYS target is not a Map".to_owned(),
                });
            }
        };
        let default = Value::Object(self.intern(""));
        self.maybe_collect();
        let list_id = self.heap.allocate(Obj::List(ObjList { elements: keys, default }));
        self.push(Value::Object(list_id))
    }

    pub(super) fn exec_get_values(&mut self) -> Result<(), RuntimeError> {
        let object = self.pop();
        let obj_id = object.as_object().ok_or_else(|| not_object("GET_VALUES target"))?;
        let (values, default) = match self.heap.get(obj_id) {
            Obj::Map(m) => (m.table.iter().map(|(_, v)| *v).collect::<Vec<_>>(), m.default),
            _ => {
                return Err(RuntimeError::Internal {
                    message: "GET_VALUES target is not a Map".to_owned(),
                });
            }
        };
        self.maybe_collect();
        let list_id = self.heap.allocate(Obj::List(ObjList {
            elements: values,
            default,
        }));
        self.push(Value::Object(list_id))
    }

    pub(super) fn exec_get_element(&mut self) -> Result<(), RuntimeError> {
        let index = self.pop();
        let object = self.pop();
        let obj_id = object.as_object().ok_or_else(|| not_object("indexing target"))?;
        let found = match self.heap.get(obj_id) {
            Obj::List(list) => {
                let idx = int_index(index)?;
                let v = *list
                    .elements
                    .get(idx)
                    .ok_or_else(|| RuntimeError::BadIndex {
                        message: format!("list index {idx} out of bounds"),
                    })?;
                Indexed::Value(v)
            }
            Obj::String(s) => {
                let idx = int_index(index)?;
                let byte = *s
                    .bytes
                    .as_bytes()
                    .get(idx)
                    .ok_or_else(|| RuntimeError::BadIndex {
                        message: format!("string index {idx} out of bounds"),
                    })?;
                Indexed::Byte(byte)
            }
            Obj::Map(map) => {
                let key_id = index.as_object().ok_or_else(|| RuntimeError::Internal {
                    message: "map key must be a string".to_owned(),
                })?;
                let hash = self.string_hash(key_id);
                Indexed::Value(map.table.get(key_id, hash).copied().unwrap_or(map.default))
            }
            _ => {
                return Err(RuntimeError::Internal {
                    message: "type does not support indexing".to_owned(),
                });
            }
        };
        let value = match found {
            Indexed::Value(v) => v,
            Indexed::Byte(b) => {
                let s = (b as char).to_string();
                Value::Object(self.intern(&s))
            }
        };
        self.push(value)
    }

    pub(super) fn exec_set_element(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop();
        let index = self.pop();
        let object = self.pop();
        let obj_id = object.as_object().ok_or_else(|| not_object("indexing target"))?;
        match self.heap.get_mut(obj_id) {
            Obj::List(list) => {
                let idx = int_index(index)?;
                let slot = list.elements.get_mut(idx).ok_or_else(|| RuntimeError::BadIndex {
                    message: format!("list index {idx} out of bounds"),
                })?;
                *slot = value;
            }
            Obj::Map(map) => {
                let key_id = index.as_object().ok_or_else(|| RuntimeError::Internal {
                    message: "map key must be a string".to_owned(),
                })?;
                let hash = match self.heap.get(key_id) {
                    Obj::String(s) => s.hash,
                    _ => {
                        return Err(RuntimeError::Internal {
                            message: "map key must be a string".to_owned(),
                        });
                    }
                };
                map.table.insert(key_id, hash, value);
            }
            _ => {
                return Err(RuntimeError::Internal {
                    message: "type does not support indexed assignment".to_owned(),
                });
            }
        }
        self.push(value)
    }

    pub(super) fn exec_in_list(&mut self) -> Result<(), RuntimeError> {
        let right = self.pop();
        let left = self.pop();
        let list_id = right.as_object().ok_or_else(|| RuntimeError::Internal {
            message: "right side of 'in' is not a List".to_owned(),
        })?;
        let found = match self.heap.get(list_id) {
            Obj::List(list) => list.elements.iter().any(|&v| super::binary::values_equal(v, left)),
            _ => {
                return Err(RuntimeError::Internal {
                    message: "right side of 'in' is not a List".to_owned(),
                });
            }
        };
        self.push(Value::Bool(found))
    }

    pub(super) fn exec_list_literal(&mut self, default_idx: u16) -> Result<(), RuntimeError> {
        let default = self.read_const(default_idx);
        self.maybe_collect();
        let list_id = self.heap.allocate(Obj::List(ObjList {
            elements: Vec::new(),
            default,
        }));
        self.push(Value::Object(list_id))
    }

    pub(super) fn exec_map_literal(&mut self, default_idx: u16) -> Result<(), RuntimeError> {
        let default = self.read_const(default_idx);
        self.maybe_collect();
        let map_id = self.heap.allocate(Obj::Map(ObjMap { table: Table::new(), default }));
        self.push(Value::Object(map_id))
    }
}
