//! Synthetic attack data for demos and local testing.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use attackwatch_core::{AttackEvent, DetailMap, DetailValue, GeoLocation};

pub const ATTACK_TYPES: &[&str] = &[
    "DDoS",
    "Malware",
    "Phishing",
    "Ransomware",
    "Zero-Day",
    "SQL Injection",
];

/// Country name with a point roughly inside it.
const COUNTRIES: &[(&str, f64, f64)] = &[
    ("USA", 39.8, -98.6),
    ("Canada", 56.1, -106.3),
    ("Mexico", 23.6, -102.5),
    ("Brazil", -14.2, -51.9),
    ("Argentina", -38.4, -63.6),
    ("United Kingdom", 54.0, -2.0),
    ("France", 46.2, 2.2),
    ("Germany", 51.2, 10.4),
    ("Netherlands", 52.1, 5.3),
    ("Russia", 61.5, 105.3),
    ("Ukraine", 48.4, 31.2),
    ("Iran", 32.4, 53.7),
    ("Israel", 31.0, 34.9),
    ("India", 20.6, 78.9),
    ("China", 35.9, 104.2),
    ("North Korea", 40.3, 127.5),
    ("South Korea", 35.9, 127.8),
    ("Japan", 36.2, 138.3),
    ("Vietnam", 14.1, 108.3),
    ("Indonesia", -0.8, 113.9),
    ("Australia", -25.3, 133.8),
    ("Nigeria", 9.1, 8.7),
    ("South Africa", -30.6, 22.9),
    ("Egypt", 26.8, 30.8),
];

const TARGETS: &[&str] = &[
    "payment gateway",
    "customer portal",
    "mail relay",
    "VPN concentrator",
    "build server",
    "DNS resolver",
    "HR database",
];

/// Degrees of jitter applied around a country's anchor point.
const JITTER_DEG: f64 = 2.0;

fn location<R: Rng + ?Sized>(rng: &mut R) -> GeoLocation {
    let (country, lat, lon) = COUNTRIES.choose(rng).copied().unwrap_or(COUNTRIES[0]);
    GeoLocation {
        latitude: (lat + rng.gen_range(-JITTER_DEG..=JITTER_DEG)).clamp(-90.0, 90.0),
        longitude: (lon + rng.gen_range(-JITTER_DEG..=JITTER_DEG)).clamp(-180.0, 180.0),
        country: country.to_string(),
    }
}

/// Random address outside the private, loopback, link-local, CGNAT and multicast ranges.
pub fn public_ipv4<R: Rng + ?Sized>(rng: &mut R) -> String {
    loop {
        let a: u8 = rng.gen_range(1..=223);
        let b: u8 = rng.gen();
        let reserved = matches!(a, 0 | 10 | 127)
            || (a == 100 && (64..=127).contains(&b))
            || (a == 169 && b == 254)
            || (a == 172 && (16..=31).contains(&b))
            || (a == 192 && b == 168);
        if !reserved {
            return format!("{}.{}.{}.{}", a, b, rng.gen::<u8>(), rng.gen_range(1..=254u8));
        }
    }
}

/// Uniform instant between January 1st of `now`'s year and `now`.
fn timestamp_this_year<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> DateTime<Utc> {
    let start = Utc
        .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let span = (now - start).num_seconds();
    if span <= 0 {
        return now;
    }
    start + Duration::seconds(rng.gen_range(0..=span))
}

pub fn generate_attack<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> AttackEvent {
    let attack_type = ATTACK_TYPES.choose(rng).copied().unwrap_or("DDoS");
    let source = location(rng);
    let destination = location(rng);
    let target = TARGETS.choose(rng).copied().unwrap_or("web server");

    let mut extra = DetailMap::new();
    extra.insert("ip_src".into(), DetailValue::from(public_ipv4(rng)));
    extra.insert("ip_dst".into(), DetailValue::from(public_ipv4(rng)));
    extra.insert(
        "description".into(),
        DetailValue::from(format!(
            "{} against the {} in {} originating from {}.",
            attack_type, target, destination.country, source.country
        )),
    );

    AttackEvent {
        id: Uuid::new_v4(),
        attack_type: attack_type.to_string(),
        severity: rng.gen_range(1..=10),
        source,
        destination,
        timestamp: timestamp_this_year(rng, now),
        extra,
    }
}

/// `count` independent synthetic attacks.
pub fn generate_attacks<R: Rng + ?Sized>(
    count: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<AttackEvent> {
    (0..count).map(|_| generate_attack(rng, now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::net::Ipv4Addr;

    #[test]
    fn generated_attacks_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
        let year_start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let attacks = generate_attacks(200, now, &mut rng);
        assert_eq!(attacks.len(), 200);

        for attack in &attacks {
            assert!(ATTACK_TYPES.contains(&attack.attack_type.as_str()));
            assert!((1..=10).contains(&attack.severity));
            assert!(attack.timestamp >= year_start && attack.timestamp <= now);
            assert!((-90.0..=90.0).contains(&attack.source.latitude));
            assert!((-180.0..=180.0).contains(&attack.destination.longitude));
            for key in ["ip_src", "ip_dst", "description"] {
                assert!(attack.extra[key].as_str().is_some(), "missing {key}");
            }
        }

        let ids: std::collections::HashSet<_> = attacks.iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), attacks.len());
    }

    #[test]
    fn ip_addresses_are_public() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            let ip: Ipv4Addr = public_ipv4(&mut rng).parse().unwrap();
            assert!(!ip.is_private());
            assert!(!ip.is_loopback());
            assert!(!ip.is_link_local());
            assert!(!ip.is_multicast());
            assert!(!ip.is_unspecified());
        }
    }

    #[test]
    fn new_year_instant_yields_now() {
        let mut rng = StdRng::seed_from_u64(1);
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(timestamp_this_year(&mut rng, now), now);
    }
}
