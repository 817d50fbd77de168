//! Demo schema and seed data, used when no schema or data file is given.

use docpipe_core::{EntityDef, FieldDef, FieldType, ScalarType};
use serde_json::{json, Value};

/// Demo entities: users that belong to groups.
pub fn entities() -> Vec<EntityDef> {
    let group = EntityDef::new("UserGroup", "usergroups").with_fields([
        FieldDef::new("name", FieldType::scalar(ScalarType::String)).filterable(),
        FieldDef::new("description", FieldType::optional_scalar(ScalarType::String)),
        FieldDef::new("inviteCode", FieldType::scalar(ScalarType::String)).hidden(),
    ]);

    let user = EntityDef::new("User", "users")
        .with_field(FieldDef::new("name", FieldType::scalar(ScalarType::String)).filterable())
        .with_field(FieldDef::new("email", FieldType::scalar(ScalarType::String)).filterable())
        .with_field(FieldDef::new("password", FieldType::scalar(ScalarType::String)).hidden())
        .with_field(FieldDef::new("age", FieldType::optional_scalar(ScalarType::Int)))
        .with_field(
            FieldDef::new("groups", FieldType::array_scalar(ScalarType::ObjectId))
                .references("UserGroup"),
        )
        .with_field(FieldDef::new(
            "profile",
            FieldType::embedded(vec![
                FieldDef::new("city", FieldType::scalar(ScalarType::String)),
                FieldDef::new("phone", FieldType::scalar(ScalarType::String)).hidden(),
            ]),
        ));

    vec![group, user]
}

fn oid(n: u32) -> Value {
    json!({ "$oid": format!("{:024x}", n) })
}

/// Demo documents keyed by collection, in the format accepted by
/// [`docpipe_core::MemoryStore::load_json`].
pub fn data() -> Value {
    json!({
        "usergroups": [
            {"_id": oid(0x100), "name": "admins", "description": "Operators", "inviteCode": "A-7731"},
            {"_id": oid(0x101), "name": "editors", "description": null, "inviteCode": "E-1204"},
        ],
        "users": [
            {
                "_id": oid(1), "name": "Ann Lee", "email": "ann@example.com", "password": "x1",
                "age": 34, "groups": [oid(0x100), oid(0x101)],
                "profile": {"city": "Oslo", "phone": "555-0101"}
            },
            {
                "_id": oid(2), "name": "Annika Berg", "email": "annika@example.com", "password": "x2",
                "age": 28, "groups": [oid(0x101)],
                "profile": {"city": "Bergen", "phone": "555-0102"}
            },
            {
                "_id": oid(3), "name": "Bob Stone", "email": "bob@example.com", "password": "x3",
                "age": 41, "groups": [],
                "profile": {"city": "Oslo", "phone": "555-0103"}
            },
            {
                "_id": oid(4), "name": "Carla Diaz", "email": "carla@example.com", "password": "x4",
                "groups": [oid(0x100)],
                "profile": {"city": "Madrid", "phone": "555-0104"}
            },
            {
                "_id": oid(5), "name": "Dan Ng", "email": "dan@example.com", "password": "x5",
                "age": 19, "groups": [],
                "profile": {"city": "Bergen", "phone": "555-0105"}
            },
            {
                "_id": oid(6), "name": "Eve Moss", "email": "eve@example.com", "password": "x6",
                "age": 52, "groups": [oid(0x101)],
                "profile": {"city": "Oslo", "phone": "555-0106"}
            },
        ],
    })
}
