//! Registration of the built-in commands whose entire effect is confined
//! to a single database: the string/list/set/hash/zset type families plus
//! the per-key keyspace commands.
//!
//! Commands that need state outside a single `Database` (`SELECT`,
//! `SUBSCRIBE`/`PUBLISH`, `FLUSHALL`, persistence, replication, and the
//! server-info family) are registered by the server crate's own dispatcher,
//! which consults this table first and falls through to its own handlers.

use std::collections::{HashMap, HashSet, VecDeque};

use bytes::Bytes;

use crate::command::{CommandContext, CommandSpec, CommandTable, ReplyValue};
use crate::value::Value;
use crate::zset::OrderedSet;

/// Registers every command this crate implements into `table`.
///
/// Called once from the server constructor, per the reference pattern of
/// explicit registration functions rather than hidden static init order.
pub fn register_builtin_commands(table: &mut CommandTable) {
    macro_rules! reg {
        ($name:literal, $handler:expr, $is_write:expr, $min_arity:expr) => {
            table.register(CommandSpec {
                name: $name,
                handler: $handler,
                is_write: $is_write,
                min_arity: $min_arity,
            });
        };
    }

    reg!("GET", cmd_get, false, 2);
    reg!("SET", cmd_set, true, 3);
    reg!("SETNX", cmd_setnx, true, 3);
    reg!("GETSET", cmd_getset, true, 3);
    reg!("STRLEN", cmd_strlen, false, 2);
    reg!("APPEND", cmd_append, true, 3);
    reg!("INCR", cmd_incr, true, 2);
    reg!("DECR", cmd_decr, true, 2);
    reg!("INCRBY", cmd_incrby, true, 3);
    reg!("DECRBY", cmd_decrby, true, 3);
    reg!("INCRBYFLOAT", cmd_incrbyfloat, true, 3);

    reg!("SADD", cmd_sadd, true, 3);
    reg!("SREM", cmd_srem, true, 3);
    reg!("SMEMBERS", cmd_smembers, false, 2);
    reg!("SISMEMBER", cmd_sismember, false, 3);
    reg!("SCARD", cmd_scard, false, 2);

    reg!("LPUSH", cmd_lpush, true, 3);
    reg!("RPUSH", cmd_rpush, true, 3);
    reg!("LPOP", cmd_lpop, true, 2);
    reg!("RPOP", cmd_rpop, true, 2);
    reg!("LLEN", cmd_llen, false, 2);
    reg!("LRANGE", cmd_lrange, false, 4);
    reg!("LINDEX", cmd_lindex, false, 3);

    reg!("HSET", cmd_hset, true, 4);
    reg!("HGET", cmd_hget, false, 3);
    reg!("HDEL", cmd_hdel, true, 3);
    reg!("HGETALL", cmd_hgetall, false, 2);
    reg!("HEXISTS", cmd_hexists, false, 3);
    reg!("HLEN", cmd_hlen, false, 2);

    reg!("ZADD", cmd_zadd, true, 4);
    reg!("ZSCORE", cmd_zscore, false, 3);
    reg!("ZRANGE", cmd_zrange, false, 4);
    reg!("ZRANGEBYSCORE", cmd_zrangebyscore, false, 4);
    reg!("ZREM", cmd_zrem, true, 3);
    reg!("ZCARD", cmd_zcard, false, 2);
    reg!("ZRANK", cmd_zrank, false, 3);
    reg!("ZINCRBY", cmd_zincrby, true, 4);

    reg!("DEL", cmd_del, true, 2);
    reg!("EXISTS", cmd_exists, false, 2);
    reg!("EXPIRE", cmd_expire, true, 3);
    reg!("PEXPIRE", cmd_pexpire, true, 3);
    reg!("TTL", cmd_ttl, false, 2);
    reg!("PTTL", cmd_pttl, false, 2);
    reg!("PERSIST", cmd_persist, true, 2);
    reg!("TYPE", cmd_type, false, 2);
    reg!("KEYS", cmd_keys, false, 1);
    reg!("FLUSHDB", cmd_flushdb, true, 1);
}

fn err(msg: impl Into<String>) -> ReplyValue {
    ReplyValue::Error(msg.into())
}

fn from_core_error(e: crate::error::CoreError) -> ReplyValue {
    ReplyValue::Error(e.to_string())
}

fn parse_i64(bytes: &[u8]) -> Result<i64, ReplyValue> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| err("ERR value is not an integer or out of range"))
}

fn parse_f64(bytes: &[u8]) -> Result<f64, ReplyValue> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| err("ERR value is not a valid float"))
}

// -- string ----------------------------------------------------------------

fn cmd_get(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => match value.str_get() {
            Ok(bytes) => ReplyValue::Bulk(bytes),
            Err(e) => from_core_error(e),
        },
        None => ReplyValue::NullBulk,
    }
}

fn cmd_set(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let value = ctx.args[2].clone();
    ctx.db.set(key, Value::Str(value));
    ReplyValue::ok()
}

fn cmd_setnx(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let value = ctx.args[2].clone();
    let inserted = ctx.db.set_if_absent(key, Value::Str(value), ctx.now_millis);
    ReplyValue::Integer(i64::from(inserted))
}

fn cmd_getset(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let value = ctx.args[2].clone();
    match ctx.db.getset(key, Value::Str(value), ctx.now_millis) {
        Some(prev) => match prev.str_get() {
            Ok(bytes) => ReplyValue::Bulk(bytes),
            Err(e) => from_core_error(e),
        },
        None => ReplyValue::NullBulk,
    }
}

fn cmd_strlen(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.str_len().map_or_else(from_core_error, |n| ReplyValue::Integer(n as i64)),
        None => ReplyValue::Integer(0),
    }
}

fn cmd_append(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let suffix = ctx.args[2].clone();
    let now = ctx.now_millis;
    let value = ctx.db.get_or_insert_with(key, now, || Value::Str(Bytes::new()));
    match value.str_append(&suffix) {
        Ok(len) => ReplyValue::Integer(len as i64),
        Err(e) => from_core_error(e),
    }
}

fn incr_helper(ctx: &mut CommandContext<'_>, delta: i64) -> ReplyValue {
    let key = ctx.args[1].clone();
    let now = ctx.now_millis;
    let value = ctx.db.get_or_insert_with(key, now, || Value::Str(Bytes::from_static(b"0")));
    match value.str_incr_by(delta) {
        Ok(n) => ReplyValue::Integer(n),
        Err(e) => from_core_error(e),
    }
}

fn cmd_incr(ctx: &mut CommandContext<'_>) -> ReplyValue {
    incr_helper(ctx, 1)
}

fn cmd_decr(ctx: &mut CommandContext<'_>) -> ReplyValue {
    incr_helper(ctx, -1)
}

fn cmd_incrby(ctx: &mut CommandContext<'_>) -> ReplyValue {
    match parse_i64(&ctx.args[2]) {
        Ok(delta) => incr_helper(ctx, delta),
        Err(e) => e,
    }
}

fn cmd_decrby(ctx: &mut CommandContext<'_>) -> ReplyValue {
    match parse_i64(&ctx.args[2]) {
        Ok(delta) => incr_helper(ctx, -delta),
        Err(e) => e,
    }
}

fn cmd_incrbyfloat(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let delta = match parse_f64(&ctx.args[2]) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let key = ctx.args[1].clone();
    let now = ctx.now_millis;
    let value = ctx.db.get_or_insert_with(key, now, || Value::Str(Bytes::from_static(b"0")));
    match value.str_incr_by_float(delta) {
        Ok(n) => ReplyValue::Bulk(Bytes::from(format_score(n))),
        Err(e) => from_core_error(e),
    }
}

// -- set ---------------------------------------------------------------

fn cmd_sadd(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let members: Vec<Bytes> = ctx.args[2..].to_vec();
    let now = ctx.now_millis;
    let value = ctx.db.get_or_insert_with(key, now, || Value::Set(HashSet::new()));
    match value.set_add(members) {
        Ok(n) => ReplyValue::Integer(n as i64),
        Err(e) => from_core_error(e),
    }
}

fn cmd_srem(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let members: Vec<Bytes> = ctx.args[2..].to_vec();
    match ctx.db.get_mut(key, ctx.now_millis) {
        Some(value) => value.set_remove(members).map_or_else(from_core_error, |n| ReplyValue::Integer(n as i64)),
        None => ReplyValue::Integer(0),
    }
}

fn cmd_smembers(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value
            .set_members()
            .map_or_else(from_core_error, |members| ReplyValue::Array(members.into_iter().map(ReplyValue::Bulk).collect())),
        None => ReplyValue::Array(Vec::new()),
    }
}

fn cmd_sismember(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let member = &ctx.args[2];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.set_contains(member).map_or_else(from_core_error, |b| ReplyValue::Integer(i64::from(b))),
        None => ReplyValue::Integer(0),
    }
}

fn cmd_scard(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.set_len().map_or_else(from_core_error, |n| ReplyValue::Integer(n as i64)),
        None => ReplyValue::Integer(0),
    }
}

// -- list ----------------------------------------------------------------

fn cmd_lpush(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let items: Vec<Bytes> = ctx.args[2..].to_vec();
    let now = ctx.now_millis;
    let value = ctx.db.get_or_insert_with(key, now, || Value::List(VecDeque::new()));
    match value.list_push_left(items) {
        Ok(n) => ReplyValue::Integer(n as i64),
        Err(e) => from_core_error(e),
    }
}

fn cmd_rpush(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let items: Vec<Bytes> = ctx.args[2..].to_vec();
    let now = ctx.now_millis;
    let value = ctx.db.get_or_insert_with(key, now, || Value::List(VecDeque::new()));
    match value.list_push_right(items) {
        Ok(n) => ReplyValue::Integer(n as i64),
        Err(e) => from_core_error(e),
    }
}

fn cmd_lpop(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    match ctx.db.get_mut(key, ctx.now_millis) {
        Some(value) => value.list_pop_left().map_or_else(from_core_error, ReplyValue::bulk_or_null),
        None => ReplyValue::NullBulk,
    }
}

fn cmd_rpop(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    match ctx.db.get_mut(key, ctx.now_millis) {
        Some(value) => value.list_pop_right().map_or_else(from_core_error, ReplyValue::bulk_or_null),
        None => ReplyValue::NullBulk,
    }
}

fn cmd_llen(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.list_len().map_or_else(from_core_error, |n| ReplyValue::Integer(n as i64)),
        None => ReplyValue::Integer(0),
    }
}

fn cmd_lrange(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let (start, stop) = match (parse_i64(&ctx.args[2]), parse_i64(&ctx.args[3])) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(e), _) | (_, Err(e)) => return e,
    };
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value
            .list_range(start, stop)
            .map_or_else(from_core_error, |items| ReplyValue::Array(items.into_iter().map(ReplyValue::Bulk).collect())),
        None => ReplyValue::Array(Vec::new()),
    }
}

fn cmd_lindex(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let index = match parse_i64(&ctx.args[2]) {
        Ok(i) => i,
        Err(e) => return e,
    };
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.list_index(index).map_or_else(from_core_error, ReplyValue::bulk_or_null),
        None => ReplyValue::NullBulk,
    }
}

// -- hash ----------------------------------------------------------------

fn cmd_hset(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let field = ctx.args[2].clone();
    let val = ctx.args[3].clone();
    let now = ctx.now_millis;
    let value = ctx.db.get_or_insert_with(key, now, || Value::Hash(HashMap::new()));
    match value.hash_set(field, val) {
        Ok(is_new) => ReplyValue::Integer(i64::from(is_new)),
        Err(e) => from_core_error(e),
    }
}

fn cmd_hget(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let field = &ctx.args[2];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.hash_get(field).map_or_else(from_core_error, ReplyValue::bulk_or_null),
        None => ReplyValue::NullBulk,
    }
}

fn cmd_hdel(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let fields: Vec<Bytes> = ctx.args[2..].to_vec();
    match ctx.db.get_mut(key, ctx.now_millis) {
        Some(value) => value.hash_del(fields).map_or_else(from_core_error, |n| ReplyValue::Integer(n as i64)),
        None => ReplyValue::Integer(0),
    }
}

fn cmd_hgetall(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.hash_get_all().map_or_else(from_core_error, |pairs| {
            ReplyValue::Array(pairs.into_iter().flat_map(|(f, v)| [ReplyValue::Bulk(f), ReplyValue::Bulk(v)]).collect())
        }),
        None => ReplyValue::Array(Vec::new()),
    }
}

fn cmd_hexists(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let field = &ctx.args[2];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.hash_exists(field).map_or_else(from_core_error, |b| ReplyValue::Integer(i64::from(b))),
        None => ReplyValue::Integer(0),
    }
}

fn cmd_hlen(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.hash_len().map_or_else(from_core_error, |n| ReplyValue::Integer(n as i64)),
        None => ReplyValue::Integer(0),
    }
}

// -- zset ----------------------------------------------------------------

fn cmd_zadd(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let score = match parse_f64(&ctx.args[2]) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let member = ctx.args[3].clone();
    let now = ctx.now_millis;
    let value = ctx.db.get_or_insert_with(key, now, || Value::ZSet(OrderedSet::new()));
    match value.zset_add(member, score) {
        Ok(is_new) => ReplyValue::Integer(i64::from(is_new)),
        Err(e) => from_core_error(e),
    }
}

fn cmd_zscore(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let member = &ctx.args[2];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => match value.zset_score(member) {
            Ok(Some(score)) => ReplyValue::Bulk(Bytes::from(format_score(score))),
            Ok(None) => ReplyValue::NullBulk,
            Err(e) => from_core_error(e),
        },
        None => ReplyValue::NullBulk,
    }
}

fn cmd_zrange(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let (start, stop) = match (parse_i64(&ctx.args[2]), parse_i64(&ctx.args[3])) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(e), _) | (_, Err(e)) => return e,
    };
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.zset_range_by_rank(start, stop).map_or_else(from_core_error, |items| {
            ReplyValue::Array(items.into_iter().map(|(m, _)| ReplyValue::Bulk(m)).collect())
        }),
        None => ReplyValue::Array(Vec::new()),
    }
}

fn cmd_zrangebyscore(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let (min, max) = match (parse_f64(&ctx.args[2]), parse_f64(&ctx.args[3])) {
        (Ok(lo), Ok(hi)) => (lo, hi),
        (Err(e), _) | (_, Err(e)) => return e,
    };
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.zset_range_by_score(min, max).map_or_else(from_core_error, |items| {
            ReplyValue::Array(items.into_iter().map(|(m, _)| ReplyValue::Bulk(m)).collect())
        }),
        None => ReplyValue::Array(Vec::new()),
    }
}

fn cmd_zrem(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let members: Vec<Bytes> = ctx.args[2..].to_vec();
    match ctx.db.get_mut(key, ctx.now_millis) {
        Some(value) => value.zset_remove(members).map_or_else(from_core_error, |n| ReplyValue::Integer(n as i64)),
        None => ReplyValue::Integer(0),
    }
}

fn cmd_zcard(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => value.zset_len().map_or_else(from_core_error, |n| ReplyValue::Integer(n as i64)),
        None => ReplyValue::Integer(0),
    }
}

fn cmd_zrank(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    let member = &ctx.args[2];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => match value.zset_rank(member) {
            Ok(Some(rank)) => ReplyValue::Integer(rank as i64),
            Ok(None) => ReplyValue::NullBulk,
            Err(e) => from_core_error(e),
        },
        None => ReplyValue::NullBulk,
    }
}

fn cmd_zincrby(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let delta = match parse_f64(&ctx.args[2]) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let member = ctx.args[3].clone();
    let now = ctx.now_millis;
    let value = ctx.db.get_or_insert_with(key, now, || Value::ZSet(OrderedSet::new()));
    match value.zset_incr_by(member, delta) {
        Ok(score) => ReplyValue::Bulk(Bytes::from(format_score(score))),
        Err(e) => from_core_error(e),
    }
}

fn format_score(score: f64) -> String {
    let mut s = format!("{score:.17}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}

// -- keyspace --------------------------------------------------------------

fn cmd_del(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let removed = ctx.args[1..].iter().filter(|key| ctx.db.delete(key)).count();
    ReplyValue::Integer(removed as i64)
}

fn cmd_exists(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let now = ctx.now_millis;
    let present = ctx.args[1..].iter().filter(|key| ctx.db.contains_key(key, now)).count();
    ReplyValue::Integer(present as i64)
}

fn cmd_expire(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let seconds = match parse_i64(&ctx.args[2]) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let expires_at = ctx.now_millis.saturating_add((seconds.max(0) as u64).saturating_mul(1000));
    let ok = ctx.db.set_expiry(&ctx.args[1], expires_at, ctx.now_millis);
    ReplyValue::Integer(i64::from(ok))
}

fn cmd_pexpire(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let millis = match parse_i64(&ctx.args[2]) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let expires_at = ctx.now_millis.saturating_add(millis.max(0) as u64);
    let ok = ctx.db.set_expiry(&ctx.args[1], expires_at, ctx.now_millis);
    ReplyValue::Integer(i64::from(ok))
}

fn cmd_ttl(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let now = ctx.now_millis;
    match ctx.db.ttl_millis(&key, now) {
        Some(millis) => ReplyValue::Integer((millis / 1000) as i64),
        None if ctx.db.contains_key(&key, now) => ReplyValue::Integer(-1),
        None => ReplyValue::Integer(-2),
    }
}

fn cmd_pttl(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = ctx.args[1].clone();
    let now = ctx.now_millis;
    match ctx.db.ttl_millis(&key, now) {
        Some(millis) => ReplyValue::Integer(millis as i64),
        None if ctx.db.contains_key(&key, now) => ReplyValue::Integer(-1),
        None => ReplyValue::Integer(-2),
    }
}

fn cmd_persist(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    ReplyValue::Integer(i64::from(ctx.db.clear_expiry(key)))
}

fn cmd_type(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let key = &ctx.args[1];
    match ctx.db.get(key, ctx.now_millis) {
        Some(value) => ReplyValue::Simple(value.kind().to_string()),
        None => ReplyValue::Simple("none".to_string()),
    }
}

fn cmd_keys(ctx: &mut CommandContext<'_>) -> ReplyValue {
    let keys = ctx.db.keys(ctx.now_millis);
    ReplyValue::Array(keys.into_iter().map(ReplyValue::Bulk).collect())
}

fn cmd_flushdb(ctx: &mut CommandContext<'_>) -> ReplyValue {
    ctx.db.flush();
    ReplyValue::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandTable;
    use crate::database::Database;

    fn table() -> CommandTable {
        let mut table = CommandTable::new();
        register_builtin_commands(&mut table);
        table
    }

    fn run(table: &CommandTable, db: &mut Database, args: &[&str]) -> ReplyValue {
        let args: Vec<Bytes> = args.iter().map(|a| Bytes::copy_from_slice(a.as_bytes())).collect();
        table.dispatch(db, 0, &args).0
    }

    #[test]
    fn set_then_get() {
        let table = table();
        let mut db = Database::new();
        assert_eq!(run(&table, &mut db, &["SET", "foo", "bar"]), ReplyValue::ok());
        assert_eq!(run(&table, &mut db, &["GET", "foo"]), ReplyValue::Bulk(Bytes::from_static(b"bar")));
        assert_eq!(run(&table, &mut db, &["GET", "missing"]), ReplyValue::NullBulk);
    }

    #[test]
    fn wrongtype_on_list_op_against_string() {
        let table = table();
        let mut db = Database::new();
        run(&table, &mut db, &["SET", "k", "v"]);
        let reply = run(&table, &mut db, &["LPUSH", "k", "x"]);
        assert!(matches!(reply, ReplyValue::Error(ref msg) if msg.starts_with("WRONGTYPE")));
    }

    #[test]
    fn expire_then_ttl() {
        let table = table();
        let mut db = Database::new();
        run(&table, &mut db, &["SET", "k", "v"]);
        assert_eq!(run(&table, &mut db, &["PEXPIRE", "k", "50"]), ReplyValue::Integer(1));
        assert_eq!(run(&table, &mut db, &["EXISTS", "k"]), ReplyValue::Integer(1));
    }

    #[test]
    fn persist_clears_expiry_and_is_idempotent() {
        let table = table();
        let mut db = Database::new();
        run(&table, &mut db, &["SET", "k", "v"]);
        run(&table, &mut db, &["PEXPIRE", "k", "10000"]);
        assert_eq!(run(&table, &mut db, &["PERSIST", "k"]), ReplyValue::Integer(1));
        assert_eq!(run(&table, &mut db, &["TTL", "k"]), ReplyValue::Integer(-1));
        assert_eq!(run(&table, &mut db, &["PERSIST", "k"]), ReplyValue::Integer(0));
    }

    #[test]
    fn incr_on_fresh_key_starts_at_zero() {
        let table = table();
        let mut db = Database::new();
        assert_eq!(run(&table, &mut db, &["INCR", "counter"]), ReplyValue::Integer(1));
        assert_eq!(run(&table, &mut db, &["INCRBY", "counter", "9"]), ReplyValue::Integer(10));
    }

    #[test]
    fn incrbyfloat_accumulates() {
        let table = table();
        let mut db = Database::new();
        run(&table, &mut db, &["SET", "k", "10"]);
        assert_eq!(run(&table, &mut db, &["INCRBYFLOAT", "k", "0.5"]), ReplyValue::Bulk(Bytes::from_static(b"10.5")));
    }

    #[test]
    fn zadd_and_zrange() {
        let table = table();
        let mut db = Database::new();
        run(&table, &mut db, &["ZADD", "z", "1", "a"]);
        run(&table, &mut db, &["ZADD", "z", "2", "b"]);
        assert_eq!(
            run(&table, &mut db, &["ZRANGE", "z", "0", "-1"]),
            ReplyValue::Array(vec![ReplyValue::Bulk(Bytes::from_static(b"a")), ReplyValue::Bulk(Bytes::from_static(b"b"))])
        );
    }

    #[test]
    fn zrangebyscore_filters_by_inclusive_bounds() {
        let table = table();
        let mut db = Database::new();
        run(&table, &mut db, &["ZADD", "z", "1", "a"]);
        run(&table, &mut db, &["ZADD", "z", "2", "b"]);
        run(&table, &mut db, &["ZADD", "z", "3", "c"]);
        assert_eq!(
            run(&table, &mut db, &["ZRANGEBYSCORE", "z", "2", "3"]),
            ReplyValue::Array(vec![ReplyValue::Bulk(Bytes::from_static(b"b")), ReplyValue::Bulk(Bytes::from_static(b"c"))])
        );
        assert_eq!(run(&table, &mut db, &["ZRANGEBYSCORE", "missing", "0", "10"]), ReplyValue::Array(Vec::new()));
    }
}
