//! Single-pass compiler: resolves locals, captures upvalues across nested
//! function scopes, type-checks, and emits bytecode in one walk of the AST.
//!
//! One [`FunctionFrame`] exists per function currently being compiled; frames
//! form a stack rather than a pointer-linked `enclosing` chain, which keeps
//! upvalue resolution (`resolve_name`) a plain loop instead of mutual
//! recursion across borrowed frames.

use std::collections::HashMap;

use crate::{
    ast::{BinaryOp, Literal, LogicalOp, Node, NodeList, UnaryOp},
    bytecode::{builder::CodeBuilder, code::Code, op::Opcode},
    errors::CompileError,
    heap::{Heap, HeapId},
    intern::Interner,
    natives,
    object::{Obj, ObjFunction, UpvalueDesc},
    types::{Type, is_substruct, same_type},
    value::Value,
};

const MAX_LOCALS: usize = 256;

struct Local {
    name: String,
    ty: Type,
    depth: i32,
    is_captured: bool,
}

#[derive(Debug, Clone, Copy)]
enum ResolvedVar {
    Local(u8),
    Upvalue(u8),
}

struct FunctionFrame {
    builder: CodeBuilder,
    locals: Vec<Local>,
    upvalues: Vec<UpvalueDesc>,
    scope_depth: i32,
    return_type: Type,
    return_seen: Vec<Type>,
    name: String,
}

impl FunctionFrame {
    fn new(name: String, return_type: Type) -> Self {
        Self {
            builder: CodeBuilder::new(),
            // Slot 0 is always the callee itself, per the calling
            // convention in SPEC_FULL.md §4.5.
            locals: vec![Local {
                name: String::new(),
                ty: Type::Nil,
                depth: 0,
                is_captured: false,
            }],
            upvalues: Vec::new(),
            scope_depth: 0,
            return_type,
            return_seen: Vec::new(),
            name,
        }
    }
}

#[derive(Clone)]
struct StructInfo {
    /// Name, declared type, and initializer expression, in declaration
    /// order (inherited properties first). The initializer is re-emitted
    /// for every subclass that doesn't override the property, since each
    /// struct template is built by its own `CLASS`/`ADD_PROP` sequence.
    props: Vec<(String, Type, Node)>,
    super_name: Option<String>,
}

#[derive(Clone)]
struct EnumInfo {
    variants: Vec<String>,
}

/// Drives compilation of a whole program into a top-level [`ObjFunction`].
pub struct Compiler<'h> {
    frames: Vec<FunctionFrame>,
    structs: HashMap<String, StructInfo>,
    enums: HashMap<String, EnumInfo>,
    errors: Vec<CompileError>,
    heap: &'h mut Heap,
    interner: &'h mut Interner,
}

impl<'h> Compiler<'h> {
    /// Compiles a whole program into the top-level script function.
    ///
    /// Returns the function's heap id on success, or the accumulated
    /// [`CompileError`]s (stable-sorted by line) on failure.
    pub fn compile_program(ast: NodeList, heap: &'h mut Heap, interner: &'h mut Interner) -> Result<HeapId, Vec<CompileError>> {
        let mut compiler = Self {
            frames: vec![FunctionFrame::new("<script>".to_owned(), Type::Nil)],
            structs: HashMap::new(),
            enums: HashMap::new(),
            errors: Vec::new(),
            heap,
            interner,
        };
        for node in &ast.nodes {
            compiler.compile_stmt(node);
        }
        let frame = compiler.frames.pop().expect("script frame always present");
        if !compiler.errors.is_empty() {
            compiler.errors.sort_by_key(|e| e.line);
            return Err(compiler.errors);
        }
        let mut code = frame.builder.build();
        Self::finish_with_implicit_return(&mut code);
        let function = ObjFunction {
            name: None,
            arity: 0,
            code,
            upvalues: frame.upvalues,
            fn_type: Type::Fun {
                params: Vec::new(),
                returns: Box::new(Type::Nil),
            },
        };
        Ok(compiler.heap.allocate(Obj::Function(function)))
    }

    fn finish_with_implicit_return(code: &mut Code) {
        // A function whose last statement isn't `return` still needs an
        // implicit `nil` return so the VM's RETURN handling is uniform.
        let last_line = if code.is_empty() { 0 } else { code.line_at(code.len() - 1) };
        let needs_implicit = code.is_empty() || Opcode::from_byte(code.byte(code.len() - 1)) != Some(Opcode::Return);
        if needs_implicit {
            code.push_byte(Opcode::Nil as u8, last_line);
            code.push_byte(Opcode::Return as u8, last_line);
        }
    }

    // --- scope helpers -----------------------------------------------------

    fn frame(&mut self) -> &mut FunctionFrame {
        self.frames.last_mut().expect("at least the script frame is always active")
    }

    fn begin_scope(&mut self) {
        self.frame().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        let frame = self.frame();
        frame.scope_depth -= 1;
        let depth = frame.scope_depth;
        while let Some(local) = frame.locals.last() {
            if local.depth <= depth {
                break;
            }
            let local = frame.locals.pop().expect("just peeked");
            if local.is_captured {
                frame.builder.emit(Opcode::CloseUpvalue);
            } else {
                frame.builder.emit(Opcode::Pop);
            }
        }
    }

    fn add_local(&mut self, name: String, ty: Type) -> u8 {
        let frame = self.frame();
        let depth = frame.scope_depth;
        if frame.locals.len() >= MAX_LOCALS {
            let line = 0;
            self.error(line, "too many local variables in one function (limit 256)".to_owned());
            return 0;
        }
        frame.locals.push(Local {
            name,
            ty,
            depth,
            is_captured: false,
        });
        u8::try_from(frame.locals.len() - 1).expect("checked against MAX_LOCALS above")
    }

    fn resolve_local_in(frame: &FunctionFrame, name: &str) -> Option<(u8, Type)> {
        frame
            .locals
            .iter()
            .enumerate()
            .rev()
            .find(|(_, local)| local.name == name)
            .map(|(idx, local)| (idx as u8, local.ty.clone()))
    }

    fn add_upvalue(frame: &mut FunctionFrame, index: u8, is_local: bool) -> u8 {
        if let Some(pos) = frame.upvalues.iter().position(|uv| uv.index == index && uv.is_local == is_local) {
            return pos as u8;
        }
        frame.upvalues.push(UpvalueDesc { index, is_local });
        (frame.upvalues.len() - 1) as u8
    }

    fn resolve_name(&mut self, name: &str) -> Option<(ResolvedVar, Type)> {
        let top = self.frames.len() - 1;
        if let Some((idx, ty)) = Self::resolve_local_in(&self.frames[top], name) {
            return Some((ResolvedVar::Local(idx), ty));
        }
        let mut found: Option<(usize, u8, Type)> = None;
        for f in (0..top).rev() {
            if let Some((idx, ty)) = Self::resolve_local_in(&self.frames[f], name) {
                self.frames[f].locals[idx as usize].is_captured = true;
                found = Some((f, idx, ty));
                break;
            }
        }
        let (found_frame, local_idx, ty) = found?;
        let mut index = local_idx;
        let mut is_local = true;
        for f in (found_frame + 1)..=top {
            index = Self::add_upvalue(&mut self.frames[f], index, is_local);
            is_local = false;
        }
        Some((ResolvedVar::Upvalue(index), ty))
    }

    fn error(&mut self, line: i32, message: String) {
        self.errors.push(CompileError::new(line, message));
    }

    fn intern(&mut self, s: &str) -> HeapId {
        self.interner.intern(self.heap, s)
    }

    /// Resolves a parsed `Type::Identifier(name)` against the structs/enums
    /// declared so far, recursing into container and function element types.
    /// Unknown names are reported once and left as `Type::Nil` so downstream
    /// checks degrade gracefully instead of cascading.
    fn resolve_type(&mut self, line: i32, ty: &Type) -> Type {
        match ty {
            Type::Identifier(name) => {
                if let Some(info) = self.structs.get(name) {
                    Type::Struct {
                        name: name.clone(),
                        super_name: info.super_name.clone(),
                        props: info.props.iter().map(|(n, t, _)| (n.clone(), t.clone())).collect(),
                    }
                } else if let Some(info) = self.enums.get(name) {
                    Type::Enum {
                        name: name.clone(),
                        variants: info.variants.iter().enumerate().map(|(i, v)| (v.clone(), i as i32)).collect(),
                    }
                } else {
                    self.error(line, format!("Unknown type '{name}'."));
                    Type::Nil
                }
            }
            Type::List(elem) => Type::List(Box::new(self.resolve_type(line, elem))),
            Type::Map(value) => Type::Map(Box::new(self.resolve_type(line, value))),
            Type::Fun { params, returns } => Type::Fun {
                params: params.iter().map(|p| self.resolve_type(line, p)).collect(),
                returns: Box::new(self.resolve_type(line, returns)),
            },
            Type::Decl(inner) => self.resolve_type(line, inner),
            other => other.clone(),
        }
    }

    /// Whether a value of type `actual` may be stored where `expected` is
    /// declared: either the ordinary structural rule, or `actual` is a
    /// struct that descends from the struct named by `expected`.
    fn assignable(expected: &Type, actual: &Type) -> bool {
        same_type(expected, actual)
            || match expected {
                Type::Struct { name, .. } => is_substruct(actual, name),
                _ => false,
            }
    }

    // --- statements ----------------------------------------------------------

    fn compile_stmt(&mut self, node: &Node) {
        match node {
            Node::DeclVar {
                line,
                name,
                declared_type,
                init,
            } => self.compile_decl_var(*line, name, declared_type, init),
            Node::DeclFun {
                line,
                name,
                params,
                return_type,
                body,
            } => self.compile_decl_fun(*line, name, params, return_type, body),
            Node::DeclStruct {
                line,
                name,
                super_name,
                props,
            } => self.compile_decl_struct(*line, name, super_name.as_deref(), props),
            Node::DeclEnum { line, name, variants } => self.compile_decl_enum(*line, name, variants),
            Node::DeclContainer { line, .. } => {
                self.error(*line, "container declarations are expressed as `name : List<T> = List<T>()`".to_owned());
            }
            Node::ExprStmt { expr, .. } => {
                self.compile_expr(expr);
                self.frame().builder.emit(Opcode::Pop);
            }
            Node::Block { body, .. } => {
                self.begin_scope();
                for stmt in &body.nodes {
                    self.compile_stmt(stmt);
                }
                self.end_scope();
            }
            Node::IfElse {
                cond,
                then_branch,
                else_branch,
                line,
            } => self.compile_if_else(*line, cond, then_branch, else_branch),
            Node::While { cond, body, line } => self.compile_while(*line, cond, body),
            Node::For {
                init,
                cond,
                update,
                body,
                line,
            } => self.compile_for(*line, init, cond, update, body),
            Node::When { line, .. } => {
                self.error(*line, "when statements are not yet supported".to_owned());
            }
            Node::Return { line, value } => self.compile_return(*line, value),
            other => {
                // A bare expression node used as a statement (shouldn't occur
                // from the parser, which always wraps expressions in
                // `ExprStmt`, but kept exhaustive rather than reachable-panic).
                self.compile_expr(other);
                self.frame().builder.emit(Opcode::Pop);
            }
        }
    }

    fn compile_decl_var(&mut self, line: i32, name: &str, declared_type: &Type, init: &Node) {
        let declared_type = self.resolve_type(line, declared_type);
        let init_type = self.compile_expr(init);
        let final_type = if matches!(declared_type, Type::Infer) {
            init_type
        } else {
            if !Self::assignable(&declared_type, &init_type) {
                self.error(line, "Declaration type and right hand side type must match.".to_owned());
            }
            declared_type
        };
        self.add_local(name.to_owned(), final_type);
    }

    fn compile_decl_fun(&mut self, line: i32, name: &str, params: &[crate::ast::Param], return_type: &Type, body: &NodeList) {
        let return_type = self.resolve_type(line, return_type);
        let param_types: Vec<Type> = params.iter().map(|p| self.resolve_type(line, &p.ty)).collect();
        let fn_type = Type::Fun {
            params: param_types.clone(),
            returns: Box::new(return_type.clone()),
        };
        // Bind the function's own name before compiling its body so a
        // recursive call resolves as an ordinary enclosing-scope lookup.
        if !name.is_empty() {
            self.add_local(name.to_owned(), fn_type.clone());
        }

        self.frames.push(FunctionFrame::new(name.to_owned(), return_type.clone()));
        for (param, ty) in params.iter().zip(param_types.iter()) {
            self.add_local(param.name.clone(), ty.clone());
        }
        for stmt in &body.nodes {
            self.compile_stmt(stmt);
        }
        let frame = self.frames.pop().expect("just pushed");
        for seen in &frame.return_seen {
            if !same_type(&return_type, seen) {
                self.error(line, format!("Returned type {seen} does not match declared return type {return_type}."));
            }
        }
        let mut code = frame.builder.build();
        Self::finish_with_implicit_return(&mut code);

        let fn_name_id = if name.is_empty() { None } else { Some(self.intern(name)) };
        let function = ObjFunction {
            name: fn_name_id,
            arity: u8::try_from(params.len()).unwrap_or(u8::MAX),
            code,
            upvalues: frame.upvalues.clone(),
            fn_type,
        };
        let function_id = self.heap.allocate(Obj::Function(function));
        let const_idx = self.frame().builder.add_const(Value::Object(function_id));

        self.frame().builder.set_location(line);
        self.frame().builder.emit_u16(Opcode::Fun, const_idx);
        self.frame().builder.emit_byte(u8::try_from(frame.upvalues.len()).unwrap_or(u8::MAX));
        for uv in &frame.upvalues {
            self.frame().builder.emit_byte(u8::from(uv.is_local));
            self.frame().builder.emit_byte(uv.index);
        }
    }

    fn compile_decl_struct(&mut self, line: i32, name: &str, super_name: Option<&str>, own_props: &[(String, Type, Node)]) {
        let inherited: Vec<(String, Type, Node)> = super_name
            .and_then(|sup| self.structs.get(sup))
            .map(|info| info.props.clone())
            .unwrap_or_default();

        let mut all_props = inherited;
        for (pname, pty, pexpr) in own_props {
            let pty = self.resolve_type(line, pty);
            if let Some(existing) = all_props.iter_mut().find(|(n, _, _)| n == pname) {
                if !same_type(&existing.1, &pty) {
                    self.error(line, "Overwritten property must of same type".to_owned());
                }
                *existing = (pname.clone(), pty, pexpr.clone());
            } else {
                all_props.push((pname.clone(), pty, pexpr.clone()));
            }
        }

        self.structs.insert(
            name.to_owned(),
            StructInfo {
                props: all_props.clone(),
                super_name: super_name.map(str::to_owned),
            },
        );

        let name_id = self.intern(name);
        let const_idx = self.frame().builder.add_const(Value::Object(name_id));
        self.frame().builder.set_location(line);
        self.frame().builder.emit_u16(Opcode::Class, const_idx);

        // Every property in `all_props` gets its own ADD_PROP, in
        // declaration order (inherited first), regardless of whether this
        // struct or an ancestor supplied the initializer expression.
        for (pname, _, pexpr) in &all_props {
            self.compile_expr(pexpr);
            let prop_id = self.intern(pname);
            let prop_const = self.frame().builder.add_const(Value::Object(prop_id));
            self.frame().builder.emit_u16(Opcode::AddProp, prop_const);
        }

        let public_props: Vec<(String, Type)> = all_props.iter().map(|(n, t, _)| (n.clone(), t.clone())).collect();
        self.add_local(
            name.to_owned(),
            Type::Struct {
                name: name.to_owned(),
                super_name: super_name.map(str::to_owned),
                props: public_props,
            },
        );
    }

    fn compile_decl_enum(&mut self, line: i32, name: &str, variants: &[String]) {
        self.enums.insert(
            name.to_owned(),
            EnumInfo {
                variants: variants.to_vec(),
            },
        );
        let name_id = self.intern(name);
        let const_idx = self.frame().builder.add_const(Value::Object(name_id));
        self.frame().builder.set_location(line);
        self.frame().builder.emit_u16(Opcode::Enum, const_idx);
        // Like FUN, ENUM carries a variable-length tail the VM reads
        // directly off the code stream: a variant count, then one
        // constant-pool index per variant name, in declaration order (so
        // ordinals fall out of position).
        self.frame().builder.emit_short(u16::try_from(variants.len()).unwrap_or(u16::MAX));
        for variant in variants {
            let variant_id = self.intern(variant);
            let variant_const = self.frame().builder.add_const(Value::Object(variant_id));
            self.frame().builder.emit_short(variant_const);
        }
        self.add_local(
            name.to_owned(),
            Type::Enum {
                name: name.to_owned(),
                variants: variants.iter().enumerate().map(|(i, v)| (v.clone(), i as i32)).collect(),
            },
        );
    }

    fn compile_if_else(&mut self, line: i32, cond: &Node, then_branch: &Node, else_branch: &Node) {
        let cond_type = self.compile_expr(cond);
        if !same_type(&cond_type, &Type::Bool) {
            self.error(line, "If condition must be a bool.".to_owned());
        }
        let then_jump = self.frame().builder.emit_jump(Opcode::JumpIfFalse);
        self.frame().builder.emit(Opcode::Pop);
        self.compile_stmt(then_branch);
        let else_jump = self.frame().builder.emit_jump(Opcode::Jump);
        self.frame().builder.patch_jump(then_jump);
        self.frame().builder.emit(Opcode::Pop);
        self.compile_stmt(else_branch);
        self.frame().builder.patch_jump(else_jump);
    }

    fn compile_while(&mut self, line: i32, cond: &Node, body: &Node) {
        let loop_start = self.frame().builder.current_offset();
        let cond_type = self.compile_expr(cond);
        if !same_type(&cond_type, &Type::Bool) {
            self.error(line, "While condition must be a bool.".to_owned());
        }
        let exit_jump = self.frame().builder.emit_jump(Opcode::JumpIfFalse);
        self.frame().builder.emit(Opcode::Pop);
        self.compile_stmt(body);
        self.frame().builder.emit_jump_by(Opcode::JumpBack, loop_start);
        self.frame().builder.patch_jump(exit_jump);
        self.frame().builder.emit(Opcode::Pop);
    }

    fn compile_for(&mut self, line: i32, init: &Node, cond: &Node, update: &Node, body: &Node) {
        self.begin_scope();
        self.compile_stmt(init);

        let cond_start = self.frame().builder.current_offset();
        let cond_type = self.compile_expr(cond);
        if !same_type(&cond_type, &Type::Bool) {
            self.error(line, "For condition must be a bool.".to_owned());
        }
        let exit_jump = self.frame().builder.emit_jump(Opcode::JumpIfFalse);
        let body_jump = self.frame().builder.emit_jump(Opcode::Jump);

        let update_start = self.frame().builder.current_offset();
        self.compile_expr(update);
        self.frame().builder.emit(Opcode::Pop);
        self.frame().builder.emit_jump_by(Opcode::JumpBack, cond_start);

        self.frame().builder.patch_jump(body_jump);
        self.frame().builder.emit(Opcode::Pop);
        self.compile_stmt(body);
        self.frame().builder.emit_jump_by(Opcode::JumpBack, update_start);

        self.frame().builder.patch_jump(exit_jump);
        self.frame().builder.emit(Opcode::Pop);
        self.end_scope();
    }

    fn compile_return(&mut self, line: i32, value: &Node) {
        let ty = self.compile_expr(value);
        self.frame().return_seen.push(ty);
        self.frame().builder.set_location(line);
        self.frame().builder.emit(Opcode::Return);
    }

    // --- expressions -----------------------------------------------------------

    fn compile_expr(&mut self, node: &Node) -> Type {
        match node {
            Node::Literal { line, value } => self.compile_literal(*line, value),
            Node::Nil { line } => {
                self.frame().builder.set_location(*line);
                self.frame().builder.emit(Opcode::Nil);
                Type::Nil
            }
            Node::Unary { line, op, operand } => self.compile_unary(*line, *op, operand),
            Node::Binary { line, op, left, right } => self.compile_binary(*line, *op, left, right),
            Node::Logical { line, op, left, right } => self.compile_logical(*line, *op, left, right),
            Node::GetVar { line, name } => self.compile_get_var(*line, name),
            Node::SetVar { line, name, value } => self.compile_set_var(*line, name, value),
            Node::GetProp { line, object, name } => self.compile_get_prop(*line, object, name),
            Node::SetProp { line, object, name, value } => self.compile_set_prop(*line, object, name, value),
            Node::GetElement { line, object, index } => self.compile_get_element(*line, object, index),
            Node::SetElement { line, object, index, value } => self.compile_set_element(*line, object, index, value),
            Node::Call { line, callee, args, type_args } => self.compile_call(*line, callee, args, type_args),
            Node::Cast { line, target, expr } => self.compile_cast(*line, target, expr),
            Node::SliceString { line, .. } => {
                self.error(*line, "string slicing is not reachable from parsed programs".to_owned());
                Type::String
            }
            other => {
                self.error(other.line(), "expression form not valid here".to_owned());
                Type::Nil
            }
        }
    }

    fn compile_literal(&mut self, line: i32, value: &Literal) -> Type {
        let frame = self.frame();
        frame.builder.set_location(line);
        match value {
            Literal::Int(n) => {
                let idx = frame.builder.add_const(Value::Int(*n));
                frame.builder.emit_u16(Opcode::Constant, idx);
                Type::Int
            }
            Literal::Float(n) => {
                let idx = frame.builder.add_const(Value::Float(*n));
                frame.builder.emit_u16(Opcode::Constant, idx);
                Type::Float
            }
            Literal::Bool(b) => {
                frame.builder.emit(if *b { Opcode::True } else { Opcode::False });
                Type::Bool
            }
            Literal::Byte(b) => {
                let idx = frame.builder.add_const(Value::Byte(*b));
                frame.builder.emit_u16(Opcode::Constant, idx);
                Type::Byte
            }
            Literal::String(s) => {
                let id = self.intern(s);
                let idx = self.frame().builder.add_const(Value::Object(id));
                self.frame().builder.emit_u16(Opcode::Constant, idx);
                Type::String
            }
        }
    }

    fn compile_unary(&mut self, line: i32, op: UnaryOp, operand: &Node) -> Type {
        let ty = self.compile_expr(operand);
        self.frame().builder.set_location(line);
        match op {
            UnaryOp::Negate => {
                if !matches!(ty, Type::Int | Type::Float) {
                    self.error(line, "Unary '-' requires an int or float operand.".to_owned());
                }
                self.frame().builder.emit(Opcode::Negate);
                ty
            }
            UnaryOp::Not => {
                if !same_type(&ty, &Type::Bool) {
                    self.error(line, "Unary '!' requires a bool operand.".to_owned());
                }
                self.frame().builder.emit(Opcode::Not);
                Type::Bool
            }
        }
    }

    fn compile_binary(&mut self, line: i32, op: BinaryOp, left: &Node, right: &Node) -> Type {
        let left_ty = self.compile_expr(left);
        let right_ty = self.compile_expr(right);
        self.frame().builder.set_location(line);
        match op {
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Mod => {
                if !same_type(&left_ty, &right_ty) {
                    self.error(line, "Operand types of binary expression must match.".to_owned());
                }
                let opcode = match op {
                    BinaryOp::Add => Opcode::Add,
                    BinaryOp::Subtract => Opcode::Subtract,
                    BinaryOp::Multiply => Opcode::Multiply,
                    BinaryOp::Divide => Opcode::Divide,
                    BinaryOp::Mod => Opcode::Mod,
                    _ => unreachable!(),
                };
                self.frame().builder.emit(opcode);
                left_ty
            }
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
                if !same_type(&left_ty, &right_ty) {
                    self.error(line, "Operand types of comparison must match.".to_owned());
                }
                let opcode = match op {
                    BinaryOp::Less => Opcode::Less,
                    BinaryOp::LessEqual => Opcode::LessEqual,
                    BinaryOp::Greater => Opcode::Greater,
                    BinaryOp::GreaterEqual => Opcode::GreaterEqual,
                    _ => unreachable!(),
                };
                self.frame().builder.emit(opcode);
                Type::Bool
            }
            BinaryOp::Equal | BinaryOp::NotEqual => {
                self.frame()
                    .builder
                    .emit(if op == BinaryOp::Equal { Opcode::Equal } else { Opcode::NotEqual });
                Type::Bool
            }
            BinaryOp::In => {
                if !matches!(right_ty, Type::List(_)) {
                    self.error(line, "Right side of 'in' must be a List.".to_owned());
                } else if let Type::List(elem) = &right_ty
                    && !same_type(&left_ty, elem)
                {
                    self.error(line, "Left side of 'in' must match the List's element type.".to_owned());
                }
                self.frame().builder.emit(Opcode::InList);
                Type::Bool
            }
        }
    }

    fn compile_logical(&mut self, line: i32, op: LogicalOp, left: &Node, right: &Node) -> Type {
        let left_ty = self.compile_expr(left);
        if !same_type(&left_ty, &Type::Bool) {
            self.error(line, "Left side of logical expression must be a bool.".to_owned());
        }
        let short_circuit = self
            .frame()
            .builder
            .emit_jump(if op == LogicalOp::And { Opcode::JumpIfFalse } else { Opcode::JumpIfTrue });
        self.frame().builder.emit(Opcode::Pop);
        let right_ty = self.compile_expr(right);
        if !same_type(&right_ty, &Type::Bool) {
            self.error(line, "Right side of logical expression must be a bool.".to_owned());
        }
        self.frame().builder.patch_jump(short_circuit);
        Type::Bool
    }

    fn compile_get_var(&mut self, line: i32, name: &str) -> Type {
        if let Some((resolved, ty)) = self.resolve_name(name) {
            self.frame().builder.set_location(line);
            match resolved {
                ResolvedVar::Local(idx) => self.frame().builder.emit_u8(Opcode::GetLocal, idx),
                ResolvedVar::Upvalue(idx) => self.frame().builder.emit_u8(Opcode::GetUpvalue, idx),
            }
            return ty;
        }
        if let Some(native) = natives::lookup(name) {
            let idx = self.frame().builder.add_const(Value::Int(native.id as i32));
            self.frame().builder.set_location(line);
            self.frame().builder.emit_u16(Opcode::Native, idx);
            return native.fn_type();
        }
        self.error(line, format!("Undeclared identifier '{name}'."));
        Type::Nil
    }

    fn compile_set_var(&mut self, line: i32, name: &str, value: &Node) -> Type {
        let value_ty = self.compile_expr(value);
        match self.resolve_name(name) {
            Some((resolved, ty)) => {
                if !Self::assignable(&ty, &value_ty) {
                    self.error(line, "Assignment type must match the variable's declared type.".to_owned());
                }
                self.frame().builder.set_location(line);
                match resolved {
                    ResolvedVar::Local(idx) => self.frame().builder.emit_u8(Opcode::SetLocal, idx),
                    ResolvedVar::Upvalue(idx) => self.frame().builder.emit_u8(Opcode::SetUpvalue, idx),
                }
                ty
            }
            None => {
                self.error(line, format!("Undeclared identifier '{name}'."));
                value_ty
            }
        }
    }

    fn compile_get_prop(&mut self, line: i32, object: &Node, name: &str) -> Type {
        let obj_ty = self.compile_expr(object);
        let prop_ty = self.resolve_prop_type(line, &obj_ty, name);
        let name_id = self.intern(name);
        let const_idx = self.frame().builder.add_const(Value::Object(name_id));
        self.frame().builder.set_location(line);
        match name {
            "size" => self.frame().builder.emit(Opcode::GetSize),
            "keys" => self.frame().builder.emit(Opcode::GetKeys),
            "values" => self.frame().builder.emit(Opcode::GetValues),
            _ => self.frame().builder.emit_u16(Opcode::GetProp, const_idx),
        }
        prop_ty
    }

    fn resolve_prop_type(&mut self, line: i32, obj_ty: &Type, name: &str) -> Type {
        match obj_ty {
            Type::List(elem) if name == "size" => {
                let _ = elem;
                Type::Int
            }
            Type::Map(_) if name == "size" => Type::Int,
            Type::Map(value) if name == "values" => Type::List(Box::new((**value).clone())),
            Type::Map(_) if name == "keys" => Type::List(Box::new(Type::String)),
            Type::String if name == "size" => Type::Int,
            Type::Struct { name: struct_name, .. } => {
                let props = self.structs.get(struct_name).map(|info| info.props.clone());
                match props.and_then(|props| props.into_iter().find(|(n, _, _)| n == name)) {
                    Some((_, ty, _)) => ty,
                    None => {
                        self.error(line, format!("Struct '{struct_name}' has no property '{name}'."));
                        Type::Nil
                    }
                }
            }
            Type::Enum { name: enum_name, .. } => {
                let has_variant = self.enums.get(enum_name).is_some_and(|info| info.variants.iter().any(|v| v == name));
                if !has_variant {
                    self.error(line, format!("Enum '{enum_name}' has no variant '{name}'."));
                }
                Type::Int
            }
            _ => {
                self.error(line, format!("Type '{obj_ty}' has no property '{name}'."));
                Type::Nil
            }
        }
    }

    fn compile_set_prop(&mut self, line: i32, object: &Node, name: &str, value: &Node) -> Type {
        let obj_ty = self.compile_expr(object);
        let value_ty = self.compile_expr(value);
        let expected = self.resolve_prop_type(line, &obj_ty, name);
        if !Self::assignable(&expected, &value_ty) {
            self.error(line, "Assigned property type must match its declared type.".to_owned());
        }
        if name == "size" {
            if !same_type(&value_ty, &Type::Int) {
                self.error(line, "Size must be an int.".to_owned());
            }
            self.frame().builder.set_location(line);
            self.frame().builder.emit(Opcode::SetSize);
            return value_ty;
        }
        let name_id = self.intern(name);
        let const_idx = self.frame().builder.add_const(Value::Object(name_id));
        self.frame().builder.set_location(line);
        self.frame().builder.emit_u16(Opcode::SetProp, const_idx);
        value_ty
    }

    fn compile_get_element(&mut self, line: i32, object: &Node, index: &Node) -> Type {
        let obj_ty = self.compile_expr(object);
        let index_ty = self.compile_expr(index);
        self.frame().builder.set_location(line);
        self.frame().builder.emit(Opcode::GetElement);
        match &obj_ty {
            Type::List(elem) => {
                if !same_type(&index_ty, &Type::Int) {
                    self.error(line, "List index must be an int.".to_owned());
                }
                (**elem).clone()
            }
            Type::String => {
                if !same_type(&index_ty, &Type::Int) {
                    self.error(line, "String index must be an int.".to_owned());
                }
                Type::String
            }
            Type::Map(value) => {
                if !same_type(&index_ty, &Type::String) {
                    self.error(line, "Map key must be a string.".to_owned());
                }
                (**value).clone()
            }
            _ => {
                self.error(line, format!("Type '{obj_ty}' does not support indexing."));
                Type::Nil
            }
        }
    }

    fn compile_set_element(&mut self, line: i32, object: &Node, index: &Node, value: &Node) -> Type {
        let obj_ty = self.compile_expr(object);
        let index_ty = self.compile_expr(index);
        let value_ty = self.compile_expr(value);
        self.frame().builder.set_location(line);
        self.frame().builder.emit(Opcode::SetElement);
        match &obj_ty {
            Type::List(elem) => {
                if !same_type(&index_ty, &Type::Int) {
                    self.error(line, "List index must be an int.".to_owned());
                }
                if !Self::assignable(elem, &value_ty) {
                    self.error(line, "Assigned element type must match the List's element type.".to_owned());
                }
            }
            Type::Map(val_ty) => {
                if !same_type(&index_ty, &Type::String) {
                    self.error(line, "Map key must be a string.".to_owned());
                }
                if !Self::assignable(val_ty, &value_ty) {
                    self.error(line, "Assigned value type must match the Map's value type.".to_owned());
                }
            }
            _ => self.error(line, format!("Type '{obj_ty}' does not support element assignment.")),
        }
        value_ty
    }

    fn compile_call(&mut self, line: i32, callee: &Node, args: &[Node], type_args: &[Type]) -> Type {
        if let Some(elem_ty) = type_args.first() {
            return self.compile_container_literal(line, callee, elem_ty.clone());
        }

        if let Node::GetVar { name, .. } = callee
            && let Some(info) = self.structs.get(name).cloned()
        {
            if let Some((resolved, _)) = self.resolve_name(name) {
                self.frame().builder.set_location(line);
                match resolved {
                    ResolvedVar::Local(idx) => self.frame().builder.emit_u8(Opcode::GetLocal, idx),
                    ResolvedVar::Upvalue(idx) => self.frame().builder.emit_u8(Opcode::GetUpvalue, idx),
                }
            }
            if !args.is_empty() {
                self.error(line, "Struct construction takes no arguments.".to_owned());
            }
            self.frame().builder.emit(Opcode::Instance);
            return Type::Struct {
                name: name.clone(),
                super_name: info.super_name.clone(),
                props: info.props.iter().map(|(n, t, _)| (n.clone(), t.clone())).collect(),
            };
        }

        let callee_ty = self.compile_expr(callee);
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.compile_expr(arg));
        }
        self.frame().builder.set_location(line);
        self.frame().builder.emit_u8(Opcode::Call, u8::try_from(args.len()).unwrap_or(u8::MAX));
        match callee_ty {
            Type::Fun { params, returns } => {
                if params.len() != arg_types.len() {
                    self.error(line, format!("Expected {} arguments but got {}.", params.len(), arg_types.len()));
                } else {
                    for (expected, got) in params.iter().zip(&arg_types) {
                        if !Self::assignable(expected, got) {
                            self.error(line, "Argument type does not match parameter type.".to_owned());
                        }
                    }
                }
                *returns
            }
            other => {
                self.error(line, format!("Type '{other}' is not callable."));
                Type::Nil
            }
        }
    }

    fn compile_container_literal(&mut self, line: i32, callee: &Node, elem_ty: Type) -> Type {
        let Node::GetVar { name, .. } = callee else {
            self.error(line, "Malformed container literal.".to_owned());
            return Type::Nil;
        };
        let elem_ty = self.resolve_type(line, &elem_ty);
        let default = self.default_value(&elem_ty);
        self.frame().builder.set_location(line);
        let idx = self.frame().builder.add_const(default);
        match name.as_str() {
            "List" => {
                self.frame().builder.emit_u16(Opcode::List, idx);
                Type::List(Box::new(elem_ty))
            }
            "Map" => {
                self.frame().builder.emit_u16(Opcode::Map, idx);
                Type::Map(Box::new(elem_ty))
            }
            _ => {
                self.error(line, "Unknown container type.".to_owned());
                Type::Nil
            }
        }
    }

    /// The fill value used when `List.size = N`/a fresh `Map` entry grows
    /// past what's explicitly set: each primitive's zero value, `nil` for
    /// everything else (structs, enums, nested containers, files).
    fn default_value(&mut self, ty: &Type) -> Value {
        match ty {
            Type::Int => Value::Int(0),
            Type::Float => Value::Float(0.0),
            Type::Bool => Value::Bool(false),
            Type::Byte => Value::Byte(0),
            Type::String => Value::Object(self.intern("")),
            _ => Value::Nil,
        }
    }

    fn compile_cast(&mut self, line: i32, target: &Type, expr: &Node) -> Type {
        let native_id = match target {
            Type::Int => natives::NativeId::IntOf,
            Type::Float => natives::NativeId::FloatOf,
            Type::Byte => natives::NativeId::ByteOf,
            Type::String => natives::NativeId::StringOf,
            _ => {
                self.error(line, format!("Cannot cast to '{target}'."));
                natives::NativeId::StringOf
            }
        };
        self.frame().builder.set_location(line);
        let native_idx = self.frame().builder.add_const(Value::Int(native_id as i32));
        self.frame().builder.emit_u16(Opcode::Native, native_idx);

        let from_ty = self.compile_expr(expr);
        self.frame().builder.set_location(line);
        match (target, &from_ty) {
            (Type::Int, Type::Float | Type::Byte | Type::Int)
            | (Type::Float, Type::Int | Type::Byte | Type::Float)
            | (Type::Byte, Type::Int | Type::Float | Type::Byte)
            | (Type::String, Type::Int | Type::Float | Type::Bool | Type::Byte) => {
                self.frame().builder.emit_u8(Opcode::Call, 1);
            }
            _ => self.error(line, format!("Cannot cast '{from_ty}' to '{target}'.")),
        }
        target.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_upvalue_is_idempotent_for_the_same_local_slot() {
        let mut frame = FunctionFrame::new("test".to_owned(), Type::Nil);
        let first = Compiler::add_upvalue(&mut frame, 2, true);
        let second = Compiler::add_upvalue(&mut frame, 2, true);
        assert_eq!(first, second);
        assert_eq!(frame.upvalues.len(), 1);
    }

    #[test]
    fn add_upvalue_distinguishes_local_from_enclosing_upvalue_capture() {
        let mut frame = FunctionFrame::new("test".to_owned(), Type::Nil);
        let as_local = Compiler::add_upvalue(&mut frame, 0, true);
        let as_upvalue = Compiler::add_upvalue(&mut frame, 0, false);
        assert_ne!(as_local, as_upvalue);
        assert_eq!(frame.upvalues.len(), 2);
    }

    #[test]
    fn undefined_variable_reference_compiles_to_an_error_not_a_panic() {
        let mut heap = Heap::new();
        let mut interner = Interner::new();
        let (ast, parse_errors) = crate::parser::Parser::new("print(missing)").parse_program();
        assert!(parse_errors.is_empty());
        let errors = Compiler::compile_program(ast, &mut heap, &mut interner).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Undeclared identifier"));
    }
}
