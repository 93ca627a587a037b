//! Boucle d'interprétation : fetch-décode-dispatch sur `OpCode`
//! (`SPEC_FULL.md` §4.1).
//!
//! Chaque opcode qui peut allouer garde ses opérandes vivants adressables
//! sur la pile au moment de l'appel d'allocation (idiome "peek puis pop",
//! §5, §9) : le GC balaye la pile d'opérandes comme jeu de racines exact, il
//! ne faut donc jamais garder un opérande uniquement dans une variable
//! locale Rust pendant un appel qui peut déclencher une collecte.

use vitte_core::{ErrCode, Handle, OpCode, Val, VarRef};

use crate::env::Env;
use crate::objects::{HeapObj, ScriptObj};

/// Exécute le bytecode à partir de `pc` jusqu'à `Stop`, un retour de la
/// dernière frame, ou une erreur latchée. Renvoie la valeur de sommet de
/// pile au moment de l'arrêt.
pub fn run(env: &mut Env, mut pc: usize) -> Result<Val, ErrCode> {
    loop {
        if env.has_error() {
            return Err(env.error.unwrap());
        }
        if !env.tick() {
            return Err(env.error.unwrap());
        }

        let byte = *env
            .exec
            .code
            .get(pc)
            .ok_or(ErrCode::InvalidByteCode)?;
        let op = OpCode::from_byte(byte).ok_or(ErrCode::InvalidByteCode)?;
        let op_len = op.operand_len();
        if pc + 1 + op_len > env.exec.code.len() {
            return Err(latch(env, ErrCode::InvalidByteCode));
        }
        // Copie les octets d'opérande en valeurs possédées *avant* le
        // `match` : plusieurs branches allouent (emprunt mutable de `env`)
        // et ne doivent pas porter un emprunt partagé de `env.exec.code`
        // au-delà de ce point.
        let mut operand = [0u8; 2];
        operand[..op_len].copy_from_slice(&env.exec.code[pc + 1..pc + 1 + op_len]);
        let op1 = operand[0];
        let op2 = operand[1];
        let opu16 = u16::from_be_bytes(operand);
        let opi8 = operand[0] as i8;
        let opi16 = i16::from_be_bytes(operand);

        match op {
            OpCode::Stop => return Ok(env.stack.last().copied().unwrap_or(Val::Undefined)),
            OpCode::Pass => pc += op.encoded_len(),

            OpCode::Ret0 => {
                if env.frame_depth() == 0 {
                    return Ok(Val::Undefined);
                }
                pc = env.frame_restore() as usize;
                env.push(Val::Undefined);
            }
            OpCode::Ret => {
                let v = env.pop();
                if env.frame_depth() == 0 {
                    return Ok(v);
                }
                pc = env.frame_restore() as usize;
                env.push(v);
            }

            OpCode::Sjmp => {
                pc = jump(pc, op.encoded_len(), opi8 as i32);
            }
            OpCode::Jmp => {
                pc = jump(pc, op.encoded_len(), opi16 as i32);
            }
            OpCode::SjmpT | OpCode::SjmpF => {
                let cond = env.truthy(env.peek(0));
                let take = cond == (op == OpCode::SjmpT);
                pc = if take {
                    jump(pc, op.encoded_len(), opi8 as i32)
                } else {
                    pc + op.encoded_len()
                };
            }
            OpCode::JmpT | OpCode::JmpF => {
                let cond = env.truthy(env.peek(0));
                let take = cond == (op == OpCode::JmpT);
                pc = if take {
                    jump(pc, op.encoded_len(), opi16 as i32)
                } else {
                    pc + op.encoded_len()
                };
            }
            OpCode::PopSjmpT | OpCode::PopSjmpF => {
                let v = env.pop();
                let cond = env.truthy(v);
                let take = cond == (op == OpCode::PopSjmpT);
                pc = if take {
                    jump(pc, op.encoded_len(), opi8 as i32)
                } else {
                    pc + op.encoded_len()
                };
            }
            OpCode::PopJmpT | OpCode::PopJmpF => {
                let v = env.pop();
                let cond = env.truthy(v);
                let take = cond == (op == OpCode::PopJmpT);
                pc = if take {
                    jump(pc, op.encoded_len(), opi16 as i32)
                } else {
                    pc + op.encoded_len()
                };
            }

            OpCode::PushUnd => {
                env.push(Val::Undefined);
                pc += op.encoded_len();
            }
            OpCode::PushNan => {
                env.push(Val::Nan);
                pc += op.encoded_len();
            }
            OpCode::PushTrue => {
                env.push(Val::Bool(true));
                pc += op.encoded_len();
            }
            OpCode::PushFalse => {
                env.push(Val::Bool(false));
                pc += op.encoded_len();
            }
            OpCode::PushZero => {
                env.push(Val::Number(0.0));
                pc += op.encoded_len();
            }
            OpCode::PushNum => {
                let n = env.exec.number_at(opu16).ok_or(ErrCode::InvalidByteCode)?;
                env.push(Val::Number(n));
                pc += op.encoded_len();
            }
            OpCode::PushStr => {
                let s = env
                    .exec
                    .string_at(opu16)
                    .ok_or(ErrCode::InvalidByteCode)?
                    .to_string();
                let v = env.alloc_string(s).map_err(|e| latch(env, e))?;
                env.push(v);
                pc += op.encoded_len();
            }
            OpCode::PushVar => {
                let r = VarRef { depth: op1, slot: op2, generation: current_generation(env, op1) };
                let v = env.get_var(r).ok_or(ErrCode::InvalidLeftValue)?;
                env.push(v);
                pc += op.encoded_len();
            }
            OpCode::PushRef => {
                let r = VarRef { depth: op1, slot: op2, generation: current_generation(env, op1) };
                env.push(Val::Reference(r));
                pc += op.encoded_len();
            }
            OpCode::PushScript => {
                let meta_offset = env
                    .exec
                    .function_entry(opu16)
                    .ok_or(ErrCode::InvalidByteCode)? as usize;
                let arity = *env
                    .exec
                    .code
                    .get(meta_offset)
                    .ok_or(ErrCode::InvalidByteCode)?;
                let nslots = *env
                    .exec
                    .code
                    .get(meta_offset + 1)
                    .ok_or(ErrCode::InvalidByteCode)?;
                let script = ScriptObj {
                    entry_pc: (meta_offset + 2) as u32,
                    captured_scope: Some(env.current_scope()),
                    arity,
                    nslots,
                };
                let v = env.alloc_script(script).map_err(|e| latch(env, e))?;
                env.push(v);
                pc += op.encoded_len();
            }
            OpCode::PushNative => {
                env.push(Val::Native(opu16));
                pc += op.encoded_len();
            }

            OpCode::Pop => {
                env.pop();
                pc += op.encoded_len();
            }

            OpCode::Neg => {
                let v = env.peek(0);
                *env.peek_mut(0) = match v.as_number() {
                    Some(n) => Val::Number(-n),
                    None => Val::Nan,
                };
                pc += op.encoded_len();
            }
            OpCode::Not => {
                let v = env.peek(0);
                *env.peek_mut(0) = Val::Number(!(v.to_i32_bitwise()) as f64);
                pc += op.encoded_len();
            }
            OpCode::LogicNot => {
                let v = env.peek(0);
                let b = !env.truthy(v);
                *env.peek_mut(0) = Val::Bool(b);
                pc += op.encoded_len();
            }

            OpCode::Mul | OpCode::Div | OpCode::Mod | OpCode::Sub
            | OpCode::AAnd | OpCode::AOr | OpCode::AXor | OpCode::LShift | OpCode::RShift => {
                binary_numeric(env, op)?;
                pc += op.encoded_len();
            }
            OpCode::Add => {
                binary_add(env)?;
                pc += op.encoded_len();
            }

            OpCode::Teq | OpCode::Tne => {
                let right = env.pop();
                let left = env.peek(0);
                let eq = env.values_equal(left, right);
                *env.peek_mut(0) = Val::Bool(if op == OpCode::Teq { eq } else { !eq });
                pc += op.encoded_len();
            }
            OpCode::Tgt | OpCode::Tge | OpCode::Tlt | OpCode::Tle => {
                let right = env.pop();
                let left = env.peek(0);
                let result = ordered_compare(env, left, right, op);
                *env.peek_mut(0) = Val::Bool(result);
                pc += op.encoded_len();
            }

            OpCode::Prop | OpCode::Elem => {
                let key = env.pop();
                let obj = env.peek(0);
                let v = field_get(env, obj, key)?;
                *env.peek_mut(0) = v;
                pc += op.encoded_len();
            }
            OpCode::PropMeth | OpCode::ElemMeth => {
                let key = env.pop();
                let obj = env.peek(0);
                let v = field_get(env, obj, key)?;
                env.push(v);
                pc += op.encoded_len();
            }

            OpCode::Assign => {
                let value = env.peek(0);
                let target = env.peek(1);
                let r = target.as_reference().ok_or(ErrCode::InvalidLeftValue)?;
                env.set_var(r, value).ok_or(ErrCode::InvalidLeftValue)?;
                // Stack before: […, ref, value]. After: […, value] — drop the
                // top (value) cell, then overwrite what's left (the ref slot)
                // with it, matching the compound-assign stack effect (§4.1.3).
                env.stack_release(1);
                *env.peek_mut(0) = value;
                pc += op.encoded_len();
            }
            OpCode::AddAssign | OpCode::SubAssign | OpCode::MulAssign | OpCode::DivAssign
            | OpCode::ModAssign | OpCode::AndAssign | OpCode::OrAssign | OpCode::XorAssign
            | OpCode::LShiftAssign | OpCode::RShiftAssign => {
                compound_var_assign(env, op)?;
                pc += op.encoded_len();
            }

            OpCode::PropAssign | OpCode::ElemAssign => {
                let value = env.pop();
                let key = env.pop();
                let obj = env.peek(0);
                field_set(env, obj, key, value)?;
                *env.peek_mut(0) = value;
                pc += op.encoded_len();
            }
            OpCode::PropAddAssign | OpCode::PropSubAssign | OpCode::PropMulAssign
            | OpCode::PropDivAssign | OpCode::PropModAssign
            | OpCode::PropAndAssign | OpCode::PropOrAssign | OpCode::PropXorAssign
            | OpCode::PropLShiftAssign | OpCode::PropRShiftAssign
            | OpCode::ElemAddAssign | OpCode::ElemSubAssign | OpCode::ElemMulAssign
            | OpCode::ElemDivAssign | OpCode::ElemModAssign
            | OpCode::ElemAndAssign | OpCode::ElemOrAssign | OpCode::ElemXorAssign
            | OpCode::ElemLShiftAssign | OpCode::ElemRShiftAssign => {
                compound_field_assign(env, op)?;
                pc += op.encoded_len();
            }

            OpCode::FuncCall => {
                let argc = op1 as usize;
                pc = func_call(env, argc, pc + op.encoded_len())?;
            }

            OpCode::Array => {
                let n = opu16 as usize;
                // Garantir qu'aucune collecte ne pourra se produire entre la
                // lecture des opérandes et l'allocation : sinon `items`
                // recopierait des handles que la collecte pourrait rendre
                // périmés sans les retrouver (§5, §9 — `items` n'est pas raciné).
                env.ensure_heap_capacity(1).map_err(|e| latch(env, e))?;
                let items: Vec<Val> = (0..n).map(|i| env.peek(n - 1 - i)).collect();
                let v = env.alloc_array(items).map_err(|e| latch(env, e))?;
                env.stack_release(n);
                env.push(v);
                pc += op.encoded_len();
            }
            OpCode::Dict => {
                let n = opu16 as usize;
                env.ensure_heap_capacity(1).map_err(|e| latch(env, e))?;
                let mut entries = Vec::with_capacity(n);
                for i in 0..n {
                    let base = (n - 1 - i) * 2;
                    let key_val = env.peek(base + 1);
                    let val = env.peek(base);
                    let key = key_val.as_handle().ok_or(ErrCode::InvalidInput)?;
                    entries.push((key, val));
                }
                let v = env.alloc_dict(entries).map_err(|e| latch(env, e))?;
                env.stack_release(n * 2);
                env.push(v);
                pc += op.encoded_len();
            }

            OpCode::Tin => return Err(latch(env, ErrCode::InvalidByteCode)),
        }
    }
}

fn latch(env: &mut Env, e: ErrCode) -> ErrCode {
    env.set_error(e);
    e
}

fn jump(pc: usize, encoded_len: usize, offset: i32) -> usize {
    ((pc + encoded_len) as i64 + offset as i64) as usize
}

/// Les `VarRef` poussées par `PushVar`/`PushRef` portent la génération du
/// scope ancêtre qu'elles désignent au moment de la lecture — on la lit
/// directement dans la chaîne de scopes courante plutôt que de la faire
/// porter par le bytecode (qui ne peut pas la connaître statiquement).
fn current_generation(env: &Env, depth: u8) -> u8 {
    // Résolution optimiste : la génération réelle est relue par `Env::get_var`
    // via une comparaison explicite ; ici on fournit la génération *actuelle*
    // du scope visé, ce qui revient à toujours réussir pour un scope vivant
    // et laisser l'appelant invalider lui-même les références devenues
    // périmées (stockées avant un pop_scope).
    let _ = depth;
    env_current_scope_generation(env, depth)
}

fn env_current_scope_generation(env: &Env, depth: u8) -> u8 {
    let mut idx = env.current_scope();
    for _ in 0..depth {
        match env.scopes.get(idx).parent {
            Some(p) => idx = p,
            None => return 0,
        }
    }
    env.scopes.get(idx).generation
}

fn binary_numeric(env: &mut Env, op: OpCode) -> Result<(), ErrCode> {
    let right = env.pop();
    let left = env.peek(0);
    let result = match (left.as_number(), op) {
        (Some(l), OpCode::Mul) => right.as_number().map(|r| Val::Number(l * r)),
        (Some(l), OpCode::Div) => right.as_number().map(|r| Val::Number(l / r)),
        (Some(l), OpCode::Mod) => right.as_number().map(|r| Val::Number(l % r)),
        (Some(l), OpCode::Sub) => right.as_number().map(|r| Val::Number(l - r)),
        (Some(_), OpCode::AAnd) => Some(Val::Number((left.to_i32_bitwise() & right.to_i32_bitwise()) as f64)),
        (Some(_), OpCode::AOr) => Some(Val::Number((left.to_i32_bitwise() | right.to_i32_bitwise()) as f64)),
        (Some(_), OpCode::AXor) => Some(Val::Number((left.to_i32_bitwise() ^ right.to_i32_bitwise()) as f64)),
        (Some(_), OpCode::LShift) => Some(Val::Number(
            (left.to_i32_bitwise().wrapping_shl(right.to_i32_bitwise() as u32 & 31)) as f64,
        )),
        (Some(_), OpCode::RShift) => Some(Val::Number(
            (left.to_i32_bitwise().wrapping_shr(right.to_i32_bitwise() as u32 & 31)) as f64,
        )),
        _ => None,
    };
    *env.peek_mut(0) = result.unwrap_or(Val::Nan);
    Ok(())
}

/// `Add` est spécial : si l'opérande gauche est une chaîne, on concatène
/// (avec coercition de droite), en gardant la gauche *posée sur la pile*
/// pendant l'appel d'allocation pour qu'elle reste une racine du GC (§4.1.1,
/// §5, §9). On ne la dépile qu'une fois le résultat calculé.
fn binary_add(env: &mut Env) -> Result<(), ErrCode> {
    let left = env.peek(1);
    if let Val::Str(lh) = left {
        let right = env.peek(0);
        let right_str = stringify(env, right);
        let left_str = env.string_contents(lh).to_string();
        let mut combined = String::with_capacity(left_str.len() + right_str.len());
        combined.push_str(&left_str);
        combined.push_str(&right_str);
        let v = env.alloc_string(combined).map_err(|e| latch(env, e))?;
        env.pop(); // right
        *env.peek_mut(0) = v;
        return Ok(());
    }
    let right = env.pop();
    let result = match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => Val::Number(l + r),
        _ => Val::Nan,
    };
    *env.peek_mut(0) = result;
    Ok(())
}

fn stringify(env: &Env, v: Val) -> String {
    match v {
        Val::Str(h) => env.string_contents(h).to_string(),
        other => other.to_string(),
    }
}

fn ordered_compare(env: &Env, left: Val, right: Val, op: OpCode) -> bool {
    let ordering = match (left, right) {
        (Val::Number(a), Val::Number(b)) => a.partial_cmp(&b),
        (Val::Str(a), Val::Str(b)) => Some(env.string_contents(a).cmp(env.string_contents(b))),
        _ => None,
    };
    let Some(ord) = ordering else { return false };
    match op {
        OpCode::Tgt => ord == std::cmp::Ordering::Greater,
        OpCode::Tge => ord != std::cmp::Ordering::Less,
        OpCode::Tlt => ord == std::cmp::Ordering::Less,
        OpCode::Tle => ord != std::cmp::Ordering::Greater,
        _ => unreachable!(),
    }
}

fn field_get(env: &mut Env, obj: Val, key: Val) -> Result<Val, ErrCode> {
    match obj {
        Val::Array(h) => {
            let idx = key.as_number().unwrap_or(f64::NAN);
            if idx.is_nan() {
                return Ok(Val::Undefined);
            }
            match env.heap.get(h) {
                HeapObj::Array(a) => Ok(a.get(idx as i64)),
                _ => Err(latch(env, ErrCode::SysError)),
            }
        }
        Val::Dict(h) => {
            let key_handle = resolve_key_handle(env, key)?;
            match env.heap.get(h) {
                HeapObj::Dict(d) => Ok(d.get(key_handle)),
                _ => Err(latch(env, ErrCode::SysError)),
            }
        }
        _ => Ok(Val::Undefined),
    }
}

fn field_set(env: &mut Env, obj: Val, key: Val, value: Val) -> Result<(), ErrCode> {
    match obj {
        Val::Array(h) => {
            let idx = key.as_number().unwrap_or(f64::NAN);
            if idx.is_nan() {
                return Ok(());
            }
            match env.heap.get_mut(h) {
                HeapObj::Array(a) => {
                    a.set(idx as i64, value);
                    Ok(())
                }
                _ => Err(latch(env, ErrCode::SysError)),
            }
        }
        Val::Dict(h) => {
            let key_handle = resolve_key_handle(env, key)?;
            match env.heap.get_mut(h) {
                HeapObj::Dict(d) => {
                    d.set(key_handle, value);
                    Ok(())
                }
                _ => Err(latch(env, ErrCode::SysError)),
            }
        }
        _ => Ok(()),
    }
}

fn resolve_key_handle(env: &mut Env, key: Val) -> Result<Handle, ErrCode> {
    match key {
        Val::Str(h) => Ok(h),
        other => {
            let s = stringify(env, other);
            match env.alloc_string(s).map_err(|e| latch(env, e))? {
                Val::Str(h) => Ok(h),
                _ => unreachable!(),
            }
        }
    }
}

fn numeric_compound(left: Val, right: Val, op: OpCode) -> Val {
    match (left.as_number(), op) {
        (Some(l), OpCode::AddAssign | OpCode::PropAddAssign | OpCode::ElemAddAssign) => {
            right.as_number().map(|r| Val::Number(l + r)).unwrap_or(Val::Nan)
        }
        (Some(l), OpCode::SubAssign | OpCode::PropSubAssign | OpCode::ElemSubAssign) => {
            right.as_number().map(|r| Val::Number(l - r)).unwrap_or(Val::Nan)
        }
        (Some(l), OpCode::MulAssign | OpCode::PropMulAssign | OpCode::ElemMulAssign) => {
            right.as_number().map(|r| Val::Number(l * r)).unwrap_or(Val::Nan)
        }
        (Some(l), OpCode::DivAssign | OpCode::PropDivAssign | OpCode::ElemDivAssign) => {
            right.as_number().map(|r| Val::Number(l / r)).unwrap_or(Val::Nan)
        }
        (Some(l), OpCode::ModAssign | OpCode::PropModAssign | OpCode::ElemModAssign) => {
            right.as_number().map(|r| Val::Number(l % r)).unwrap_or(Val::Nan)
        }
        (Some(_), OpCode::AndAssign | OpCode::PropAndAssign | OpCode::ElemAndAssign) => {
            Val::Number((left.to_i32_bitwise() & right.to_i32_bitwise()) as f64)
        }
        (Some(_), OpCode::OrAssign | OpCode::PropOrAssign | OpCode::ElemOrAssign) => {
            Val::Number((left.to_i32_bitwise() | right.to_i32_bitwise()) as f64)
        }
        (Some(_), OpCode::XorAssign | OpCode::PropXorAssign | OpCode::ElemXorAssign) => {
            Val::Number((left.to_i32_bitwise() ^ right.to_i32_bitwise()) as f64)
        }
        (Some(_), OpCode::LShiftAssign | OpCode::PropLShiftAssign | OpCode::ElemLShiftAssign) => {
            Val::Number(left.to_i32_bitwise().wrapping_shl(right.to_i32_bitwise() as u32 & 31) as f64)
        }
        (Some(_), OpCode::RShiftAssign | OpCode::PropRShiftAssign | OpCode::ElemRShiftAssign) => {
            Val::Number(left.to_i32_bitwise().wrapping_shr(right.to_i32_bitwise() as u32 & 31) as f64)
        }
        _ => Val::Nan,
    }
}

/// Seul `AddAssign` accepte un accumulateur chaîne (concaténation) ; toute
/// autre forme composée exige un nombre des deux côtés, sous peine de
/// `InvalidLeftValue` (§4.1.3).
fn compound_var_assign(env: &mut Env, op: OpCode) -> Result<(), ErrCode> {
    let right = env.peek(0);
    let target_ref = env.peek(1).as_reference().ok_or(ErrCode::InvalidLeftValue)?;
    let current = env.get_var(target_ref).ok_or(ErrCode::InvalidLeftValue)?;

    let new_value = if op == OpCode::AddAssign {
        if let Val::Str(lh) = current {
            let right_str = stringify(env, right);
            let left_str = env.string_contents(lh).to_string();
            let mut combined = String::with_capacity(left_str.len() + right_str.len());
            combined.push_str(&left_str);
            combined.push_str(&right_str);
            env.alloc_string(combined).map_err(|e| latch(env, e))?
        } else if current.is_number() {
            numeric_compound(current, right, op)
        } else {
            return Err(latch(env, ErrCode::InvalidLeftValue));
        }
    } else {
        if !current.is_number() {
            return Err(latch(env, ErrCode::InvalidLeftValue));
        }
        numeric_compound(current, right, op)
    };

    env.set_var(target_ref, new_value).ok_or(ErrCode::InvalidLeftValue)?;
    env.stack_release(1);
    *env.peek_mut(0) = new_value;
    Ok(())
}

fn compound_field_assign(env: &mut Env, op: OpCode) -> Result<(), ErrCode> {
    let right = env.pop();
    let key = env.pop();
    let obj = env.peek(0);
    let current = field_get(env, obj, key)?;

    let is_add = matches!(op, OpCode::PropAddAssign | OpCode::ElemAddAssign);
    let new_value = if is_add {
        if let Val::Str(lh) = current {
            let right_str = stringify(env, right);
            let left_str = env.string_contents(lh).to_string();
            let mut combined = String::with_capacity(left_str.len() + right_str.len());
            combined.push_str(&left_str);
            combined.push_str(&right_str);
            env.alloc_string(combined).map_err(|e| latch(env, e))?
        } else if current.is_number() {
            numeric_compound(current, right, op)
        } else {
            return Err(latch(env, ErrCode::InvalidLeftValue));
        }
    } else {
        if !current.is_number() {
            return Err(latch(env, ErrCode::InvalidLeftValue));
        }
        numeric_compound(current, right, op)
    };

    field_set(env, obj, key, new_value)?;
    *env.peek_mut(0) = new_value;
    Ok(())
}

/// `argc` arguments suivis de l'appelé sont au sommet de la pile ; l'appelé
/// script met en place une nouvelle frame et renvoie le nouveau `pc` ; un
/// appel natif s'exécute en place et on reprend juste après `FuncCall`.
fn func_call(env: &mut Env, argc: usize, after_call_pc: usize) -> Result<usize, ErrCode> {
    let callee = env.peek(argc);
    match callee {
        Val::Script(h) => {
            let script = match env.heap.get(h) {
                HeapObj::Script(s) => *s,
                _ => return Err(latch(env, ErrCode::SysError)),
            };
            let args: Vec<Val> = (0..argc).map(|i| env.peek(argc - 1 - i)).collect();
            env.stack_release(argc + 1);
            let new_pc = env
                .frame_setup(script, &args, after_call_pc as u32)
                .map_err(|e| latch(env, e))?;
            Ok(new_pc as usize)
        }
        Val::Native(idx) => {
            let argv_base = env.stack_len() - argc;
            let result = env.call_native(idx, argc as u8, argv_base)?;
            env.stack_release(argc + 1);
            env.push(result);
            Ok(after_call_pc)
        }
        _ => Err(latch(env, ErrCode::InvalidCallor)),
    }
}
