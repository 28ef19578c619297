//! Sample catalog shared by integration tests

use basketrec_core::{CatalogSnapshot, Event, EventType, ObjectId, Product, User, UserId};

/// Users with events; hex ids so they also work on `/recommend`
pub const ALICE: &str = "aaaaaaaaaaaaaaaaaaaaaaa1";
pub const BOB: &str = "bbbbbbbbbbbbbbbbbbbbbbb2";
pub const CAROL: &str = "ccccccccccccccccccccccc3";
pub const DAVE: &str = "ddddddddddddddddddddddd4";
/// Hex id with no profile and no events
pub const STRANGER: &str = "eeeeeeeeeeeeeeeeeeeeeee5";

pub fn product_id(n: u8) -> ObjectId {
    ObjectId::parse(&format!("65f1a2b3c4d5e6f7a8b9c0{:02x}", n)).unwrap()
}

pub fn user_id(id: &str) -> UserId {
    UserId::parse(id).unwrap()
}

fn product(n: u8, title: &str, description: &str) -> Product {
    let mut p = Product::new(product_id(n), title);
    p.description = Some(description.to_string());
    p.price = 2.5 + n as f64;
    p
}

pub fn products() -> Vec<Product> {
    let mut yogurt = product(1, "Greek Yogurt", "Plain greek yogurt, high protein, low sugar");
    yogurt.health_conditions = vec!["diabetes".to_string()];
    yogurt.seasonal = vec!["all".to_string()];

    let mut granola = product(2, "Oat Granola", "Crunchy oat granola with honey and almonds");
    granola.seasonal = vec!["all".to_string()];

    let almond_milk = product(3, "Almond Milk", "Unsweetened almond milk, dairy free");

    let mut tea = product(4, "Green Tea", "Organic green tea leaves");
    tea.health_conditions = vec!["hypertension".to_string()];

    let mut bar = product(5, "Protein Bar", "Chocolate protein bar with oats");
    bar.occupation_tags = vec!["athlete".to_string()];

    let honey = product(6, "Wildflower Honey", "Raw honey from wildflowers");

    let mut oats = product(7, "Rolled Oats", "Whole grain rolled oats, low sugar");
    oats.health_conditions = vec!["diabetes".to_string()];

    let mut electrolytes = product(8, "Electrolyte Drink", "Sugar free electrolyte drink");
    electrolytes.occupation_tags = vec!["athlete".to_string(), "nurse".to_string()];

    vec![yogurt, granola, almond_milk, tea, bar, honey, oats, electrolytes]
}

pub fn users() -> Vec<User> {
    let mut alice = User::new(user_id(ALICE));
    alice.age = Some(34.0);
    alice.weight = Some(62.0);
    alice.height = Some(168.0);
    alice.medical_conditions = vec!["diabetes".to_string()];

    let mut bob = User::new(user_id(BOB));
    bob.age = Some(29.0);
    bob.weight = Some(80.0);
    bob.height = Some(182.0);
    bob.occupation = vec!["athlete".to_string()];

    let mut carol = User::new(user_id(CAROL));
    carol.age = Some(61.0);
    carol.weight = Some(70.0);
    carol.height = Some(160.0);
    carol.medical_conditions = vec!["hypertension".to_string()];

    let mut dave = User::new(user_id(DAVE));
    dave.age = Some(58.0);
    dave.weight = Some(85.0);
    dave.height = Some(175.0);

    vec![alice, bob, carol, dave]
}

pub fn events() -> Vec<Event> {
    let e = |user: &str, product: u8, event_type: EventType, weight: f64| {
        Event::new(user_id(user), product_id(product), event_type, weight)
    };
    vec![
        e(ALICE, 1, EventType::Purchase, 7.0),
        e(ALICE, 2, EventType::AddToCart, 3.0),
        e(ALICE, 3, EventType::View, 1.0),
        e(BOB, 1, EventType::Purchase, 7.0),
        e(BOB, 2, EventType::Purchase, 7.0),
        e(BOB, 5, EventType::Favourite, 5.0),
        e(BOB, 8, EventType::View, 1.0),
        e(CAROL, 4, EventType::Purchase, 7.0),
        e(CAROL, 6, EventType::View, 1.0),
        e(CAROL, 2, EventType::Search, 2.0),
        e(DAVE, 4, EventType::AddToCart, 3.0),
        e(DAVE, 6, EventType::Purchase, 7.0),
        e(DAVE, 1, EventType::View, 1.0),
    ]
}

pub fn catalog() -> CatalogSnapshot {
    CatalogSnapshot {
        users: users(),
        products: products(),
        events: events(),
    }
}
