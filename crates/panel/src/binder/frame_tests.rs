// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::*;

#[test]
fn call_encodes_as_afb_array() -> anyhow::Result<()> {
    let frame = Frame::Call {
        id: "7".into(),
        method: "vshl/subscribe".into(),
        args: json!({ "va_id": "VA-001", "events": ["voice_authstate_event"] }),
    };
    let parsed: serde_json::Value = serde_json::from_str(&frame.encode())?;
    assert_eq!(parsed[0], 2);
    assert_eq!(parsed[1], "7");
    assert_eq!(parsed[2], "vshl/subscribe");
    assert_eq!(parsed[3]["va_id"], "VA-001");
    Ok(())
}

#[test]
fn decodes_success_reply() -> anyhow::Result<()> {
    let text = r#"[3,"1",{"jtype":"afb-reply","request":{"status":"success"},"response":{"request_id":"r1"}}]"#;
    match Frame::decode(text)? {
        Frame::Reply { id, reply } => {
            assert_eq!(id, "1");
            assert_eq!(reply["response"]["request_id"], "r1");
        }
        other => anyhow::bail!("expected reply, got {other:?}"),
    }
    Ok(())
}

#[test]
fn decodes_failure_reply() -> anyhow::Result<()> {
    let text = r#"[4,"2",{"jtype":"afb-reply","request":{"status":"failed"}}]"#;
    assert!(matches!(Frame::decode(text)?, Frame::Failure { ref id, .. } if id == "2"));
    Ok(())
}

#[test]
fn decodes_event() -> anyhow::Result<()> {
    let text = r#"[5,"vshl/voice_dialogstate_event",{"state":"LISTENING"}]"#;
    let frame = Frame::decode(text)?;
    assert_eq!(
        frame,
        Frame::Event {
            name: "vshl/voice_dialogstate_event".into(),
            data: json!({ "state": "LISTENING" }),
        }
    );
    Ok(())
}

#[test]
fn numeric_call_id_is_accepted() -> anyhow::Result<()> {
    let frame = Frame::decode(r#"[3,42,{}]"#)?;
    assert!(matches!(frame, Frame::Reply { ref id, .. } if id == "42"));
    Ok(())
}

#[test]
fn reply_without_payload_decodes_as_null() -> anyhow::Result<()> {
    let frame = Frame::decode(r#"[3,"9"]"#)?;
    assert_eq!(frame, Frame::Reply { id: "9".into(), reply: serde_json::Value::Null });
    Ok(())
}

#[yare::parameterized(
    not_json     = { "hello" },
    not_array    = { r#"{"a":1}"# },
    too_short    = { "[3]" },
    unknown_code = { r#"[9,"1",{}]"# },
    bad_key      = { r#"[3,{},{}]"# },
    call_no_verb = { r#"[2,"1",7,{}]"# },
)]
fn rejects_malformed(text: &str) {
    assert!(matches!(Frame::decode(text), Err(BinderError::Protocol(_))));
}

#[yare::parameterized(
    wildcard        = { "*", "vshl/voice_authstate_event", true },
    api_wildcard    = { "vshl/*", "vshl/voice_authstate_event", true },
    other_api       = { "alexa/*", "vshl/voice_authstate_event", false },
    exact           = { "vshl/voice_authstate_event", "vshl/voice_authstate_event", true },
    exact_mismatch  = { "vshl/voice_authstate_event", "vshl/voice_dialogstate_event", false },
    bare_prefix     = { "vshl*", "vshl/voice_authstate_event", false },
)]
fn pattern_matching(pattern: &str, name: &str, expected: bool) {
    assert_eq!(pattern_matches(pattern, name), expected);
}
