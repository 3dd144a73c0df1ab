//! Calling convention and native-function dispatch.
//!
//! `Call` is agnostic to what it calls: the callee is always an ordinary
//! heap value, and dispatch branches on its `Obj` kind. A closure call pushes
//! a new [`super::CallFrame`] and lets the main loop keep running; a native
//! call runs synchronously and pushes its result directly, matching the
//! description in `SPEC_FULL.md` §6 that natives "are ordinary callable heap
//! values, not a separate call path."

use std::{
    borrow::Cow,
    io::{Read, Seek, SeekFrom, Write},
};

use crate::{
    errors::RuntimeError,
    heap::HeapId,
    io::PrintWriter,
    natives::NativeId,
    object::{Obj, ObjFile, ObjList},
    resource::MAX_CALL_FRAMES,
    value::Value,
};

use super::{CallFrame, VM};

fn native_err(err: std::io::Error) -> RuntimeError {
    RuntimeError::Native { message: err.to_string() }
}

/// Expands the `\a \b \f \n \r \t \v \\ \' \" \?` escapes `SPEC_FULL.md` §6
/// lists for `print`. Source text keeps escapes verbatim (see `lexer.rs`'s
/// `string` scanner); this is the one place they're resolved.
fn expand_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('a') => out.push('\u{7}'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{C}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('v') => out.push('\u{B}'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('?') => out.push('?'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

impl<P: PrintWriter> VM<P> {
    pub(super) fn call_value(&mut self, argc: usize) -> Result<(), RuntimeError> {
        let callee = self.peek(argc);
        let callee_id = callee.as_object().ok_or_else(|| RuntimeError::Internal {
            message: "called value is not callable".to_owned(),
        })?;
        match self.heap.get(callee_id) {
            Obj::Closure(_) => self.call_closure(callee_id, argc),
            Obj::Native(native) => {
                let id = native.id;
                self.call_native(id, argc)
            }
            _ => Err(RuntimeError::Internal {
                message: "called value is not callable".to_owned(),
            }),
        }
    }

    pub(super) fn call_closure(&mut self, closure_id: HeapId, argc: usize) -> Result<(), RuntimeError> {
        if self.frames.len() >= MAX_CALL_FRAMES {
            return Err(RuntimeError::StackOverflow);
        }
        let function_id = self.function_of(closure_id);
        let arity = match self.heap.get(function_id) {
            Obj::Function(f) => f.arity as usize,
            _ => unreachable!("closure function handle is not a function"),
        };
        if argc != arity {
            return Err(RuntimeError::Internal {
                message: format!("expected {arity} arguments but got {argc}"),
            });
        }
        let stack_base = self.stack.len() - argc - 1;
        self.frames.push(CallFrame {
            closure: closure_id,
            ip: 0,
            stack_base,
        });
        Ok(())
    }

    fn take_call_args(&mut self, argc: usize) -> Vec<Value> {
        let args = self.stack.split_off(self.stack.len() - argc);
        self.pop();
        args
    }

    fn call_native(&mut self, id: NativeId, argc: usize) -> Result<(), RuntimeError> {
        let args = self.take_call_args(argc);
        let result = match id {
            NativeId::Clock => Ok(Value::Float(self.start.elapsed().as_secs_f64())),
            NativeId::Print => self.native_print(&args),
            NativeId::Input => self.native_input(),
            NativeId::Open => self.native_open(&args),
            NativeId::ReadLine => self.native_read_line(&args),
            NativeId::ReadAll => self.native_read_all(&args),
            NativeId::ReadBytes => self.native_read_bytes(&args),
            NativeId::Append => self.native_append(&args),
            NativeId::Eof => self.native_eof(&args),
            NativeId::Rewind => self.native_rewind(&args),
            NativeId::Clear => self.native_clear(&args),
            NativeId::Close => Ok(Value::Nil),
            NativeId::IsDigit => self.native_char_class(&args, u8::is_ascii_digit),
            NativeId::IsAlpha => self.native_char_class(&args, u8::is_ascii_alphabetic),
            NativeId::RandomUniform => self.native_random_uniform(&args),
            NativeId::Exp => self.native_exp(&args),
            NativeId::StringOf => self.native_string_of(&args),
            NativeId::IntOf => self.native_int_of(&args),
            NativeId::FloatOf => self.native_float_of(&args),
            NativeId::ByteOf => self.native_byte_of(&args),
        }?;
        self.push(result)
    }

    fn expect_object(value: Value, what: &str) -> Result<HeapId, RuntimeError> {
        value.as_object().ok_or_else(|| RuntimeError::Internal {
            message: format!("{what} is not an object"),
        })
    }

    fn expect_float(value: Value) -> Result<f64, RuntimeError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(n) => Ok(f64::from(n)),
            Value::Byte(b) => Ok(f64::from(b)),
            _ => Err(RuntimeError::Internal {
                message: "expected a numeric argument".to_owned(),
            }),
        }
    }

    fn with_file_mut<R>(&mut self, file_id: HeapId, f: impl FnOnce(&mut ObjFile) -> Result<R, RuntimeError>) -> Result<R, RuntimeError> {
        match self.heap.get_mut(file_id) {
            Obj::File(file) => f(file),
            _ => Err(RuntimeError::Internal {
                message: "expected a File argument".to_owned(),
            }),
        }
    }

    fn native_print(&mut self, args: &[Value]) -> Result<Value, RuntimeError> {
        let text = self.value_to_text(args[0])?;
        let expanded = expand_escapes(&text);
        self.print.write_str(Cow::Owned(expanded)).map_err(native_err)?;
        self.print.write_str(Cow::Borrowed("\n")).map_err(native_err)?;
        Ok(Value::Nil)
    }

    fn value_to_text(&self, value: Value) -> Result<String, RuntimeError> {
        match value {
            Value::Object(id) => match self.heap.get(id) {
                Obj::String(s) => Ok(s.as_str().to_owned()),
                _ => Err(RuntimeError::Internal {
                    message: "expected a printable value".to_owned(),
                }),
            },
            other => Ok(other.to_string()),
        }
    }

    fn native_input(&mut self) -> Result<Value, RuntimeError> {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map_err(native_err)?;
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Value::Object(self.intern(&line)))
    }

    fn native_open(&mut self, args: &[Value]) -> Result<Value, RuntimeError> {
        let path = self.as_string(args[0])?;
        let handle = std::fs::OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| RuntimeError::Native {
                message: format!("could not open '{path}': {e}"),
            })?;
        let len = handle.metadata().map(|m| m.len()).unwrap_or(0);
        self.maybe_collect();
        let file_id = self.heap.allocate(Obj::File(ObjFile {
            path,
            handle,
            read_pos: 0,
            len,
        }));
        Ok(Value::Object(file_id))
    }

    fn native_read_line(&mut self, args: &[Value]) -> Result<Value, RuntimeError> {
        let file_id = Self::expect_object(args[0], "read_line's argument")?;
        let mut line_bytes = Vec::new();
        self.with_file_mut(file_id, |file| {
            file.handle.seek(SeekFrom::Start(file.read_pos)).map_err(native_err)?;
            let mut byte = [0u8; 1];
            loop {
                match file.handle.read(&mut byte) {
                    Ok(0) => break,
                    Ok(_) if byte[0] == b'\n' => break,
                    Ok(_) => line_bytes.push(byte[0]),
                    Err(e) => return Err(native_err(e)),
                }
            }
            file.read_pos = file.handle.stream_position().map_err(native_err)?;
            Ok(())
        })?;
        let text = String::from_utf8_lossy(&line_bytes).into_owned();
        Ok(Value::Object(self.intern(&text)))
    }

    fn native_read_all(&mut self, args: &[Value]) -> Result<Value, RuntimeError> {
        let file_id = Self::expect_object(args[0], "read_all's argument")?;
        let mut buf = Vec::new();
        let at_eof = self.with_file_mut(file_id, |file| {
            if file.read_pos >= file.len {
                return Ok(true);
            }
            file.handle.seek(SeekFrom::Start(file.read_pos)).map_err(native_err)?;
            file.handle.read_to_end(&mut buf).map_err(native_err)?;
            file.read_pos = file.len;
            Ok(false)
        })?;
        if at_eof {
            return Ok(Value::Nil);
        }
        let text = String::from_utf8_lossy(&buf).into_owned();
        Ok(Value::Object(self.intern(&text)))
    }

    fn native_read_bytes(&mut self, args: &[Value]) -> Result<Value, RuntimeError> {
        let file_id = Self::expect_object(args[0], "read_bytes's argument")?;
        let mut buf = Vec::new();
        self.with_file_mut(file_id, |file| {
            file.handle.seek(SeekFrom::Start(file.read_pos)).map_err(native_err)?;
            file.handle.read_to_end(&mut buf).map_err(native_err)?;
            file.read_pos = file.len;
            Ok(())
        })?;
        let elements: Vec<Value> = buf.into_iter().map(Value::Byte).collect();
        self.maybe_collect();
        let list_id = self.heap.allocate(Obj::List(ObjList {
            elements,
            default: Value::Byte(0),
        }));
        Ok(Value::Object(list_id))
    }

    fn native_append(&mut self, args: &[Value]) -> Result<Value, RuntimeError> {
        let file_id = Self::expect_object(args[0], "append's first argument")?;
        let text = self.as_string(args[1])?;
        self.with_file_mut(file_id, |file| {
            file.handle.write_all(text.as_bytes()).map_err(native_err)?;
            file.len += text.len() as u64;
            Ok(())
        })?;
        Ok(Value::Nil)
    }

    fn native_eof(&mut self, args: &[Value]) -> Result<Value, RuntimeError> {
        let file_id = Self::expect_object(args[0], "eof's argument")?;
        self.with_file_mut(file_id, |file| Ok(Value::Bool(file.read_pos >= file.len)))
    }

    fn native_rewind(&mut self, args: &[Value]) -> Result<Value, RuntimeError> {
        let file_id = Self::expect_object(args[0], "rewind's argument")?;
        self.with_file_mut(file_id, |file| {
            file.read_pos = 0;
            Ok(Value::Nil)
        })
    }

    fn native_clear(&mut self, args: &[Value]) -> Result<Value, RuntimeError> {
        let file_id = Self::expect_object(args[0], "clear's argument")?;
        self.with_file_mut(file_id, |file| {
            file.handle.set_len(0).map_err(native_err)?;
            file.handle.seek(SeekFrom::Start(0)).map_err(native_err)?;
            file.read_pos = 0;
            file.len = 0;
            Ok(Value::Nil)
        })
    }

    fn native_char_class(&self, args: &[Value], predicate: fn(&u8) -> bool) -> Result<Value, RuntimeError> {
        let s = self.as_string(args[0])?;
        Ok(Value::Bool(s.as_bytes().first().is_some_and(predicate)))
    }

    fn native_random_uniform(&mut self, args: &[Value]) -> Result<Value, RuntimeError> {
        let lo = Self::expect_float(args[0])?;
        let hi = Self::expect_float(args[1])?;
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        #[allow(clippy::cast_precision_loss)]
        let unit = (x >> 11) as f64 / (1u64 << 53) as f64;
        Ok(Value::Float(lo + unit * (hi - lo)))
    }

    fn native_exp(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        Ok(Value::Float(Self::expect_float(args[0])?.exp()))
    }

    fn native_string_of(&mut self, args: &[Value]) -> Result<Value, RuntimeError> {
        let text = self.value_to_text(args[0])?;
        Ok(Value::Object(self.intern(&text)))
    }

    fn native_int_of(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        let n = match args[0] {
            Value::Int(n) => n,
            #[allow(clippy::cast_possible_truncation)]
            Value::Float(f) => f as i32,
            Value::Byte(b) => i32::from(b),
            _ => {
                return Err(RuntimeError::Internal {
                    message: "int() expects an int, float, or byte".to_owned(),
                });
            }
        };
        Ok(Value::Int(n))
    }

    fn native_float_of(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        Ok(Value::Float(Self::expect_float(args[0])?))
    }

    fn native_byte_of(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let b = match args[0] {
            Value::Byte(b) => b,
            Value::Int(n) => n as u8,
            Value::Float(f) => f as u8,
            _ => {
                return Err(RuntimeError::Internal {
                    message: "byte() expects an int, float, or byte".to_owned(),
                });
            }
        };
        Ok(Value::Byte(b))
    }
}
