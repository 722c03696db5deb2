//! The `(phase, direction, packet_id)` dispatch table: every place the
//! proxy looks inside a packet body, mutates it, or grows children.

use chrono::Local;
use serde_json::json;
use serde_json::Value as Json;

use mc_protocol::metadata::{EntityMetadata, MetaValue};
use mc_protocol::{read_varint, write_varint, Angle, Buffer, Decode, Direction, Encode, Phase, Position, Uuid};

use crate::config::PreferenceValue;
use crate::error::{ProxyError, Result};
use crate::packet::Packet;
use crate::session::Session;
use crate::status::StatusCode;

fn body_of(packet: &Packet) -> Result<Buffer> {
    packet
        .body_buffer()
        .ok_or_else(|| ProxyError::Validation("handler invoked on a non-decoded packet".into()))
}

/// Looks up the handler for this packet's `(phase, direction, id)` and runs
/// it. Packets with no handler pass through untouched.
pub fn dispatch(packet: &mut Packet, session: &Session) -> Result<()> {
    let phase = session.phase();
    let direction = packet.direction;
    let Some(id) = packet.id() else {
        return Ok(());
    };

    match (phase, direction, id) {
        (Phase::Handshake, Direction::Serverbound, 0x00) => handshake(packet, session),
        (Phase::Status, Direction::Clientbound, 0x00) => status_motd(packet, session),
        (Phase::Login, Direction::Clientbound, 0x03) => login_set_compression(packet, session),
        (Phase::Login, Direction::Serverbound, 0x00) => login_start(packet, session),
        (Phase::Login, Direction::Clientbound, 0x02) => login_success(packet, session),
        (Phase::Play, Direction::Serverbound, 0x03) => play_chat(packet, session),
        (Phase::Play, Direction::Clientbound, 0x26) => join_game(packet, session),
        (Phase::Play, Direction::Serverbound, 0x2D) => rightclick(packet, session),
        (Phase::Play, Direction::Serverbound, 0x2C) => building_radio(packet, session),
        (Phase::Play, Direction::Clientbound, 0x32) => player_abilities(packet, session),
        (Phase::Play, Direction::Clientbound, 0x59) => entity_properties(packet, session),
        (Phase::Play, Direction::Serverbound, 0x0E) => interact_entity(packet, session),
        (Phase::Play, Direction::Clientbound, 0x44) => entity_metadata(packet, session),
        (Phase::Play, Direction::Serverbound, 0x15) => vehicle_move(packet, session),
        (Phase::Play, Direction::Clientbound, 0x03) => spawn_entity(packet, session),
        (Phase::Play, Direction::Clientbound, 0x29 | 0x2A) => entity_position_drop(packet, session),
        _ => Ok(()),
    }
}

fn handshake(packet: &mut Packet, session: &Session) -> Result<()> {
    session.set_status(StatusCode::StatusPing);
    let mut buf = body_of(packet)?;
    let protocol = read_varint(&mut buf)?;
    let addr = String::decode(&mut buf)?;
    let port = u16::decode(&mut buf)?;
    let next_state = read_varint(&mut buf)?;

    session.set_phase(Phase::from_i32(next_state).unwrap_or(Phase::Handshake));

    let mut out = Vec::new();
    write_varint(&mut out, protocol)?;
    addr.encode(&mut out)?;
    port.encode(&mut out)?;
    write_varint(&mut out, next_state)?;
    packet.set_body(Buffer::new(out));
    Ok(())
}

fn status_motd(packet: &mut Packet, session: &Session) -> Result<()> {
    if !session.get_preference("CustomMOTD")?.as_bool() {
        return Ok(());
    }
    let mut buf = body_of(packet)?;
    let mut value = Json::decode(&mut buf)?;

    let now = Local::now().format("%H:%M:%S");
    value["description"] = json!({ "text": format!("§2§l§n{now}§r") });

    let mut out = Vec::new();
    value.encode(&mut out)?;
    packet.set_body(Buffer::new(out));
    session.set_phase(Phase::Handshake);
    Ok(())
}

fn login_set_compression(packet: &mut Packet, session: &Session) -> Result<()> {
    let mut buf = body_of(packet)?;
    let threshold = read_varint(&mut buf)?;
    session.set_compression_threshold(threshold)?;

    let mut out = Vec::new();
    write_varint(&mut out, threshold)?;
    packet.set_body(Buffer::new(out));
    Ok(())
}

fn login_start(packet: &mut Packet, session: &Session) -> Result<()> {
    session.set_status(StatusCode::LoggingIn);
    let mut buf = body_of(packet)?;
    let mut username = String::decode(&mut buf)?;

    if session.get_preference("EnableFakename")?.as_bool() {
        if let Some(fake) = session.get_preference("FakenameInput")?.as_str() {
            username = fake.to_string();
        }
    }
    session.set_login_username(username.clone());

    let mut out = Vec::new();
    username.encode(&mut out)?;
    packet.set_body(Buffer::new(out));
    Ok(())
}

fn login_success(_packet: &mut Packet, session: &Session) -> Result<()> {
    session.set_phase(Phase::Play);
    session.set_preference("Camera", PreferenceValue::Json(json!({})))?;
    session.set_status(StatusCode::Playing);
    Ok(())
}

fn play_chat(packet: &mut Packet, session: &Session) -> Result<()> {
    let mut buf = body_of(packet)?;
    let msg = String::decode(&mut buf)?;

    if let Some(rest) = msg.strip_prefix("/camera") {
        let _ = rest;
        camera_command(packet, session)?;
    } else if let Some(rest) = msg.strip_prefix("/state") {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        if tokens.len() >= 2 {
            if let (Ok(n), Ok(f)) = (tokens[0].parse::<u8>(), tokens[1].parse::<f32>()) {
                let mut body = Vec::new();
                n.encode(&mut body)?;
                f.encode(&mut body)?;
                packet.add_child_packet(Packet::synthesize(
                    Direction::Clientbound,
                    0x1F,
                    Buffer::new(body),
                ));
                packet.drop_packet();
            }
        }
    } else if msg.starts_with("/giants") {
        let current = session.get_preference_or("giants", PreferenceValue::Bool(false)).as_bool();
        session.set_preference("giants", PreferenceValue::Bool(!current))?;
        packet.drop_packet();
    }
    Ok(())
}

fn camera_command(packet: &mut Packet, session: &Session) -> Result<()> {
    if let Some(target) = session.target_id() {
        let camera = session
            .get_preference("Camera")?
            .as_json()
            .cloned()
            .unwrap_or_else(|| json!({}));

        let mut entity_id = target;
        if let Some(current) = camera.get("EntityID").and_then(Json::as_i64) {
            if current as i32 != session.player_entity_id() {
                entity_id = session.player_entity_id();
            }
        }

        let mut camera = camera;
        camera["EntityID"] = json!(entity_id);
        session.set_preference("Camera", PreferenceValue::Json(camera))?;

        let mut body = Vec::new();
        write_varint(&mut body, entity_id)?;
        packet.add_child_packet(Packet::synthesize(
            Direction::Clientbound,
            0x3F,
            Buffer::new(body),
        ));
    } else {
        let error = json!({
            "italic": true,
            "color": "red",
            "text": "Unable to switch camera. First, select an entity.",
        });
        let mut body = Vec::new();
        error.encode(&mut body)?;
        packet.add_child_packet(Packet::synthesize(
            Direction::Clientbound,
            0x50,
            Buffer::new(body),
        ));
    }
    packet.drop_packet();
    Ok(())
}

fn join_game(packet: &mut Packet, session: &Session) -> Result<()> {
    let mut buf = body_of(packet)?;
    let eid = i32::decode(&mut buf)?;
    let gamemode = u8::decode(&mut buf)?;
    let dimension = i32::decode(&mut buf)?;
    let seed = i64::decode(&mut buf)?;
    let max_players = u8::decode(&mut buf)?;
    let level_type = String::decode(&mut buf)?;
    let view_distance = read_varint(&mut buf)?;
    let debug_info = bool::decode(&mut buf)?;
    let respawn_screen = bool::decode(&mut buf)?;

    session.set_player_entity_id(eid)?;

    let mut out = Vec::new();
    eid.encode(&mut out)?;
    gamemode.encode(&mut out)?;
    dimension.encode(&mut out)?;
    seed.encode(&mut out)?;
    max_players.encode(&mut out)?;
    level_type.encode(&mut out)?;
    write_varint(&mut out, view_distance)?;
    debug_info.encode(&mut out)?;
    respawn_screen.encode(&mut out)?;
    packet.set_body(Buffer::new(out));

    packet.add_child_packet(tab_header_packet(session)?);
    Ok(())
}

fn rightclick(packet: &mut Packet, _session: &Session) -> Result<()> {
    let mut body = Vec::new();
    "I right clicked!".to_string().encode(&mut body)?;
    packet.add_child_packet(Packet::synthesize(
        Direction::Serverbound,
        0x03,
        Buffer::new(body),
    ));
    Ok(())
}

fn building_radio(packet: &mut Packet, session: &Session) -> Result<()> {
    let mut buf = body_of(packet)?;
    let hand = read_varint(&mut buf)?;
    let location = Position::decode(&mut buf)?;
    let face = read_varint(&mut buf)?;
    let cursor = [f32::decode(&mut buf)?, f32::decode(&mut buf)?, f32::decode(&mut buf)?];
    let inside_block = bool::decode(&mut buf)?;

    let radio = session
        .get_preference_or("BuildingRadio", PreferenceValue::Int(0))
        .as_i32()
        .unwrap_or(0);

    let encode_placement = |hand: i32, pos: Position, face: i32, cursor: [f32; 3], inside: bool| -> Result<Vec<u8>> {
        let mut body = Vec::new();
        write_varint(&mut body, hand)?;
        pos.encode(&mut body)?;
        write_varint(&mut body, face)?;
        for c in cursor {
            c.encode(&mut body)?;
        }
        inside.encode(&mut body)?;
        Ok(body)
    };

    if radio == 2 {
        for y in 0..3i16 {
            for x in -1..2i32 {
                let mut sibling = location;
                sibling.x += x;
                sibling.y += y;
                let body = encode_placement(hand, sibling, 1, cursor, inside_block)?;
                packet.add_child_packet(Packet::synthesize(
                    Direction::Serverbound,
                    0x2C,
                    Buffer::new(body),
                ));
            }
        }
    } else if radio == 1 {
        let mut sibling = location;
        sibling.y += 5;
        let body = encode_placement(hand, sibling, face, cursor, inside_block)?;
        packet.add_child_packet(Packet::synthesize(
            Direction::Serverbound,
            0x2C,
            Buffer::new(body),
        ));
    }

    let body = encode_placement(hand, location, face, cursor, inside_block)?;
    packet.set_body(Buffer::new(body));
    Ok(())
}

fn player_abilities(packet: &mut Packet, session: &Session) -> Result<()> {
    let mut buf = body_of(packet)?;
    let flags = i8::decode(&mut buf)?;
    let flying_speed = f32::decode(&mut buf)?;
    let fov = f32::decode(&mut buf)?;

    session.set_preference(
        "_Abilities",
        PreferenceValue::Json(json!([flags, flying_speed, fov])),
    )?;

    let out_flags = if session.get_preference("EnableFlying")?.as_bool() {
        flags | 6
    } else {
        flags
    };

    let mut out = Vec::new();
    out_flags.encode(&mut out)?;
    flying_speed.encode(&mut out)?;
    fov.encode(&mut out)?;
    packet.set_body(Buffer::new(out));
    Ok(())
}

struct PropertyModifier {
    uuid: Uuid,
    amount: f64,
    operation: i8,
}

struct Property {
    name: String,
    base: f64,
    modifiers: Vec<PropertyModifier>,
}

fn decode_property(buf: &mut Buffer) -> Result<Property> {
    let name = String::decode(buf)?;
    let base = f64::decode(buf)?;
    let modifier_count = read_varint(buf)?;
    let mut modifiers = Vec::with_capacity(modifier_count.max(0) as usize);
    for _ in 0..modifier_count {
        modifiers.push(PropertyModifier {
            uuid: Uuid::decode(buf)?,
            amount: f64::decode(buf)?,
            operation: i8::decode(buf)?,
        });
    }
    Ok(Property { name, base, modifiers })
}

fn encode_property(property: &Property, out: &mut Vec<u8>) -> Result<()> {
    property.name.encode(out)?;
    property.base.encode(out)?;
    write_varint(out, property.modifiers.len() as i32)?;
    for modifier in &property.modifiers {
        modifier.uuid.encode(out)?;
        modifier.amount.encode(out)?;
        modifier.operation.encode(out)?;
    }
    Ok(())
}

fn entity_properties(packet: &mut Packet, session: &Session) -> Result<()> {
    let mut buf = body_of(packet)?;
    let eid = read_varint(&mut buf)?;
    let count = i32::decode(&mut buf)?;

    if eid != session.player_entity_id() {
        let leftover = buf.to_bytes();
        let mut out = Vec::new();
        write_varint(&mut out, eid)?;
        count.encode(&mut out)?;
        out.extend(leftover);
        packet.set_body(Buffer::new(out));
        return Ok(());
    }

    let mut properties = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        properties.push(decode_property(&mut buf)?);
    }

    let movement_speed = f64::from(
        session
            .get_preference_or("movementSpeed", PreferenceValue::Float(0.7))
            .as_f32()
            .unwrap_or(0.7),
    );
    for property in &mut properties {
        if property.name == "generic.movementSpeed" {
            property.base = movement_speed;
        }
    }

    let mut out = Vec::new();
    write_varint(&mut out, eid)?;
    count.encode(&mut out)?;
    for property in &properties {
        encode_property(property, &mut out)?;
    }
    packet.set_body(Buffer::new(out));
    Ok(())
}

fn interact_entity(packet: &mut Packet, session: &Session) -> Result<()> {
    let mut buf = body_of(packet)?;
    let eid = read_varint(&mut buf)?;
    let interaction_type = read_varint(&mut buf)?;
    let target = if interaction_type == 2 {
        Some([f32::decode(&mut buf)?, f32::decode(&mut buf)?, f32::decode(&mut buf)?])
    } else {
        None
    };
    let hand = if interaction_type != 1 {
        Some(read_varint(&mut buf)?)
    } else {
        None
    };

    if let Some(mut entry) = session.cached_effect_metadata(eid) {
        if let MetaValue::Byte(flags) = &mut entry.value {
            *flags |= 0x40;
        }
        let mut metadata = EntityMetadata::default();
        metadata.set(0, entry);
        metadata.tail = vec![0xFF];

        let mut body = Vec::new();
        write_varint(&mut body, eid)?;
        metadata.encode(&mut body)?;
        packet.add_child_packet(Packet::synthesize(
            Direction::Clientbound,
            0x44,
            Buffer::new(body),
        ));
    }
    session.set_target_id(eid);

    let mut out = Vec::new();
    write_varint(&mut out, eid)?;
    write_varint(&mut out, interaction_type)?;
    if let Some(target) = target {
        for c in target {
            c.encode(&mut out)?;
        }
    }
    if let Some(hand) = hand {
        write_varint(&mut out, hand)?;
    }
    packet.set_body(Buffer::new(out));
    Ok(())
}

fn entity_metadata(packet: &mut Packet, session: &Session) -> Result<()> {
    let mut buf = body_of(packet)?;
    let eid = read_varint(&mut buf)?;
    let mut metadata = EntityMetadata::decode(&mut buf)?;

    if let Some(entry) = metadata.get(0).cloned() {
        session.cache_effect_metadata(eid, entry);
    }
    if session.target_id() == Some(eid) {
        if let Some(mut entry) = session.cached_effect_metadata(eid) {
            if let MetaValue::Byte(flags) = &mut entry.value {
                *flags |= 0x40;
            }
            metadata.set(0, entry);
        }
    }

    let mut out = Vec::new();
    write_varint(&mut out, eid)?;
    metadata.encode(&mut out)?;
    packet.set_body(Buffer::new(out));
    Ok(())
}

fn vehicle_move(packet: &mut Packet, session: &Session) -> Result<()> {
    if session.get_preference("DropSteering")?.as_bool() {
        packet.drop_packet();
    }
    Ok(())
}

fn spawn_entity(packet: &mut Packet, session: &Session) -> Result<()> {
    let mut buf = body_of(packet)?;
    let eid = read_varint(&mut buf)?;
    let uuid = Uuid::decode(&mut buf)?;
    let mut entity_type = read_varint(&mut buf)?;
    let pos = [f64::decode(&mut buf)?, f64::decode(&mut buf)?, f64::decode(&mut buf)?];
    let ang = [Angle::decode(&mut buf)?, Angle::decode(&mut buf)?, Angle::decode(&mut buf)?];
    let vel = [i16::decode(&mut buf)?, i16::decode(&mut buf)?, i16::decode(&mut buf)?];

    if session.get_preference_or("giants", PreferenceValue::Bool(false)).as_bool() {
        entity_type = 30;
    }

    let mut out = Vec::new();
    write_varint(&mut out, eid)?;
    uuid.encode(&mut out)?;
    write_varint(&mut out, entity_type)?;
    for p in pos {
        p.encode(&mut out)?;
    }
    for a in ang {
        a.encode(&mut out)?;
    }
    for v in vel {
        v.encode(&mut out)?;
    }
    packet.set_body(Buffer::new(out));
    Ok(())
}

fn entity_position_drop(packet: &mut Packet, session: &Session) -> Result<()> {
    if session.get_preference("DropEntityMovement")?.as_bool() {
        packet.drop_packet();
    }
    Ok(())
}

/// Shared by the Join Game handler and the `CustomHeader` preference
/// resolver: the styled tab-list header/footer, or an empty translate pair
/// when the preference is off.
pub fn tab_header_packet(session: &Session) -> Result<Packet> {
    let header = if session.get_preference("CustomHeader")?.as_bool() {
        json!({
            "text": "",
            "extra": [
                {"bold": true, "obfuscated": true, "color": "gold", "text": "p "},
                {"bold": true, "italic": true, "color": "dark_green", "text": "Rust "},
                {"bold": true, "italic": true, "color": "red", "text": "MC"},
                {"bold": true, "italic": true, "color": "dark_red", "text": "Proxy"},
                {"bold": true, "obfuscated": true, "color": "gold", "text": " p\n"},
            ],
        })
    } else {
        json!({ "translate": "" })
    };
    let footer = json!({ "translate": "" });

    let mut body = Vec::new();
    header.encode(&mut body)?;
    footer.encode(&mut body)?;
    Ok(Packet::synthesize(Direction::Clientbound, 0x54, Buffer::new(body)))
}

/// Preference-change resolver: turns a changed preference name into the
/// packets that push the new setting to the client immediately instead of
/// waiting for it to matter on the next relevant packet.
pub fn resolve_preference_update(name: &str, session: &Session) -> Result<Vec<Packet>> {
    match name {
        "CustomHeader" => Ok(vec![tab_header_packet(session)?]),
        "EnableFlying" => {
            let cached = session.get_preference("_Abilities")?;
            let Some(triple) = cached.as_json().and_then(Json::as_array).cloned() else {
                return Ok(Vec::new());
            };
            let mut flags = triple.first().and_then(Json::as_i64).unwrap_or(0) as i8;
            let mut flying_speed = triple.get(1).and_then(Json::as_f64).unwrap_or(0.0) as f32;
            let fov = triple.get(2).and_then(Json::as_f64).unwrap_or(0.0) as f32;

            if session.get_preference("EnableFlying")?.as_bool() {
                flags |= 6;
                flying_speed = 1.0;
            }

            let mut body = Vec::new();
            flags.encode(&mut body)?;
            flying_speed.encode(&mut body)?;
            fov.encode(&mut body)?;
            Ok(vec![Packet::synthesize(Direction::Clientbound, 0x32, Buffer::new(body))])
        }
        "movementSpeed" => {
            let speed = f64::from(
                session
                    .get_preference_or("movementSpeed", PreferenceValue::Float(0.7))
                    .as_f32()
                    .unwrap_or(0.7),
            );
            let property = Property {
                name: "generic.movementSpeed".to_string(),
                base: speed,
                modifiers: Vec::new(),
            };
            let mut body = Vec::new();
            write_varint(&mut body, session.player_entity_id())?;
            1i32.encode(&mut body)?;
            encode_property(&property, &mut body)?;
            Ok(vec![Packet::synthesize(Direction::Clientbound, 0x59, Buffer::new(body))])
        }
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Preferences;

    fn session_with(prefs: Preferences) -> Session {
        std::sync::Arc::into_inner(Session::new(prefs)).unwrap()
    }

    #[test]
    fn camera_with_no_target_yields_error_child_only() {
        let session = session_with(Preferences::with_defaults());
        session.set_preference("Camera", PreferenceValue::Json(json!({}))).unwrap();

        let mut body = Vec::new();
        "/camera".to_string().encode(&mut body).unwrap();
        let mut packet = Packet::synthesize(Direction::Serverbound, 0x03, Buffer::new(body));

        play_chat(&mut packet, &session).unwrap();
        assert!(!packet.send_self);
        assert_eq!(packet.children.len(), 1);
        assert_eq!(packet.children[0].id(), Some(0x50));
    }

    #[test]
    fn camera_with_target_yields_camera_child() {
        let session = session_with(Preferences::with_defaults());
        session.set_preference("Camera", PreferenceValue::Json(json!({}))).unwrap();
        session.set_target_id(7);

        let mut body = Vec::new();
        "/camera".to_string().encode(&mut body).unwrap();
        let mut packet = Packet::synthesize(Direction::Serverbound, 0x03, Buffer::new(body));

        play_chat(&mut packet, &session).unwrap();
        assert_eq!(packet.children.len(), 1);
        assert_eq!(packet.children[0].id(), Some(0x3F));
        let mut out_body = packet.children[0].body_buffer().unwrap();
        assert_eq!(read_varint(&mut out_body).unwrap(), 7);
    }

    #[test]
    fn giants_toggles_on_then_off() {
        let session = session_with(Preferences::with_defaults());
        let mut msg = Vec::new();
        "/giants".to_string().encode(&mut msg).unwrap();

        let mut packet = Packet::synthesize(Direction::Serverbound, 0x03, Buffer::new(msg.clone()));
        play_chat(&mut packet, &session).unwrap();
        assert!(session.get_preference("giants").unwrap().as_bool());

        let mut packet = Packet::synthesize(Direction::Serverbound, 0x03, Buffer::new(msg));
        play_chat(&mut packet, &session).unwrap();
        assert!(!session.get_preference("giants").unwrap().as_bool());
    }

    #[test]
    fn building_radio_two_emits_nine_siblings() {
        let session = session_with(Preferences::with_defaults());
        session
            .set_preference("BuildingRadio", PreferenceValue::Int(2))
            .unwrap();

        let mut body = Vec::new();
        write_varint(&mut body, 0).unwrap(); // hand
        Position::new(0, 64, 0).encode(&mut body).unwrap();
        write_varint(&mut body, 0).unwrap(); // face
        for _ in 0..3 {
            0.5f32.encode(&mut body).unwrap();
        }
        true.encode(&mut body).unwrap();

        let mut packet = Packet::synthesize(Direction::Serverbound, 0x2C, Buffer::new(body));
        building_radio(&mut packet, &session).unwrap();
        assert_eq!(packet.children.len(), 9);
    }

    #[test]
    fn interact_entity_skips_glow_child_without_cached_metadata() {
        let session = session_with(Preferences::with_defaults());
        let mut body = Vec::new();
        write_varint(&mut body, 5).unwrap();
        write_varint(&mut body, 0).unwrap(); // interact, no target/hand fields beyond this
        write_varint(&mut body, 0).unwrap(); // hand (type != 1)
        let mut packet = Packet::synthesize(Direction::Serverbound, 0x0E, Buffer::new(body));

        interact_entity(&mut packet, &session).unwrap();
        assert!(packet.children.is_empty());
        assert_eq!(session.target_id(), Some(5));
    }
}
