/// Lua script for the scripted admission strategy.
///
/// Performs trim, count, conditional add, and expire as one atomic
/// server-side operation, closing the gap between the count read and
/// the record write that the counted strategy leaves open.
///
/// KEYS[1] = the rate limit key
/// ARGV[1] = maximum requests
/// ARGV[2] = window duration (milliseconds)
/// ARGV[3] = current timestamp (milliseconds)
///
/// Returns: [admitted (0/1), pre-add count, oldest score or -1]
///
/// The pre-add count and the oldest score are returned so callers can
/// compute the same response headers as the counted strategy.
pub const CHECK_AND_RECORD_SCRIPT: &str = r#"
local key = KEYS[1]
local max_requests = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

-- Drop entries strictly older than the window start
local window_start = now - window_ms
redis.call('ZREMRANGEBYSCORE', key, 0, '(' .. window_start)

-- Count requests already inside the window, before adding this one
local count = redis.call('ZCOUNT', key, window_start, '+inf')

local admitted = 0
if count < max_requests then
    redis.call('ZADD', key, now, tostring(now))
    redis.call('EXPIRE', key, math.ceil(window_ms / 1000))
    admitted = 1
end

local oldest = -1
local entry = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if entry[2] then
    oldest = tonumber(entry[2])
end

return {admitted, count, oldest}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_is_well_formed() {
        assert!(CHECK_AND_RECORD_SCRIPT.contains("ZREMRANGEBYSCORE"));
        assert!(CHECK_AND_RECORD_SCRIPT.contains("ZCOUNT"));
        assert!(CHECK_AND_RECORD_SCRIPT.contains("ZADD"));
        assert!(CHECK_AND_RECORD_SCRIPT.contains("EXPIRE"));
    }
}
