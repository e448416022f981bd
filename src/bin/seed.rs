//! Fills an empty database with demo profiles so the discover feed has
//! something to show. Run with `cargo run --bin seed`; a non-empty users
//! table makes it a no-op.

use chrono::Utc;
use citadel::config::Config;
use citadel::models::{Gender, User, UserStatus, YEARS};
use citadel::store::{SqliteStore, UserStore};
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const COLLEGES: [&str; 10] = [
    "Stanford University",
    "UCLA",
    "UC Berkeley",
    "NYU",
    "University of Michigan",
    "UT Austin",
    "Georgia Tech",
    "Carnegie Mellon",
    "USC",
    "Boston University",
];

const SKILLS: [&str; 12] = [
    "Design",
    "Product",
    "iOS",
    "React",
    "Data Science",
    "Marketing",
    "Photography",
    "UI/UX",
    "Writing",
    "Finance",
    "Music",
    "Film",
];

const MALE_NAMES: [&str; 49] = [
    "Aarav", "Ethan", "Liam", "Noah", "Arjun", "Rohan", "Lucas", "Mateo", "Jay", "Kian", "Owen",
    "Isaac", "Leo", "Mason", "Vihaan", "Aditya", "Nate", "Ryan", "Aiden", "Kabir", "Neil", "Dev",
    "Sam", "Jordan", "Eli", "Reid", "Caleb", "Ian", "Zane", "Aaron", "Ishaan", "Varun", "Ravi",
    "Kunal", "Rishi", "Arnav", "Pranav", "Rayan", "Ritik", "Arman", "Dhruv", "Reyansh", "Yash",
    "Vir", "Rohit", "Advik", "Vivaan", "Tejas", "Sid",
];

const FEMALE_NAMES: [&str; 38] = [
    "Anya", "Maya", "Zoe", "Leah", "Aanya", "Sara", "Emily", "Sophia", "Ava", "Olivia", "Chloe",
    "Isla", "Ariana", "Sienna", "Kiara", "Lila", "Riya", "Nyra", "Hannah", "Layla", "Meera",
    "Isha", "Nora", "Amy", "Alina", "Tara", "Jasmine", "Lana", "Mira", "Natasha", "Priya", "Neha",
    "Radhika", "Kavya", "Dhriti", "Ira", "Aditi", "Kaira",
];

const MALE_IMAGE: &str =
    "https://images.pexels.com/photos/614810/pexels-photo-614810.jpeg?auto=compress&cs=tinysrgb&w=800&q=80";
const FEMALE_IMAGE: &str =
    "https://images.pexels.com/photos/774909/pexels-photo-774909.jpeg?auto=compress&cs=tinysrgb&w=800&q=80";

fn pick_skills(rng: &mut impl Rng) -> Vec<String> {
    let count = if rng.random_bool(0.4) { 1 } else { 2 };
    let mut skills: Vec<String> = Vec::with_capacity(count);
    while skills.len() < count {
        let skill = SKILLS[rng.random_range(0..SKILLS.len())];
        if !skills.iter().any(|s| s == skill) {
            skills.push(skill.to_owned());
        }
    }
    skills
}

fn demo_user(name: &str, gender: Gender, rng: &mut impl Rng) -> User {
    let now = Utc::now();
    User {
        id: Uuid::now_v7(),
        name: name.to_owned(),
        gender,
        college: COLLEGES[rng.random_range(0..COLLEGES.len())].to_owned(),
        year: YEARS[rng.random_range(0..YEARS.len())].to_owned(),
        age: rng.random_range(18..=23),
        skills: pick_skills(rng),
        image_url: match gender {
            Gender::Male => MALE_IMAGE.to_owned(),
            _ => FEMALE_IMAGE.to_owned(),
        },
        phone: None,
        email: None,
        status: UserStatus::Active,
        is_premium: false,
        premium_expires_at: None,
        email_verified: false,
        email_verification_token: None,
        email_verification_expires: None,
        otp: None,
        otp_expires: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let store = SqliteStore::connect(&config.database_url).await.unwrap();

    let existing = store.count_users().await.unwrap();
    if existing > 0 {
        warn!(existing, "users table is not empty, skipping seed");
        return;
    }

    let mut users = Vec::with_capacity(100);
    {
        // demo profiles have no contact info, so they can never log in
        let mut rng = rand::rng();
        for i in 0..60 {
            users.push(demo_user(MALE_NAMES[i % MALE_NAMES.len()], Gender::Male, &mut rng));
        }
        for i in 0..40 {
            users.push(demo_user(FEMALE_NAMES[i % FEMALE_NAMES.len()], Gender::Female, &mut rng));
        }
    }

    for user in &users {
        store.insert_user(user).await.unwrap();
    }
    info!(count = users.len(), "seeded demo users");
}
