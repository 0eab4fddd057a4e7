use horizon_db::{HotelSeedDataset, SeedResult};

use crate::commands::{with_migrated_pool, CommandResult, EXIT_MIGRATION, EXIT_VERIFY};

pub fn run() -> CommandResult {
    let result = with_migrated_pool("seed", |pool| async move {
        let seeded = HotelSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;

        let verification = HotelSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_VERIFY))?;

        if verification.all_present {
            Ok(seeded)
        } else {
            let failed_checks = verification
                .checks
                .iter()
                .filter_map(|(check, passed)| (!passed).then_some(*check))
                .collect::<Vec<_>>();
            Err(("seed_verification", verification_message(&failed_checks), EXIT_VERIFY))
        }
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summary(&seeded)),
        Err(failure) => failure,
    }
}

fn summary(seeded: &SeedResult) -> String {
    format!(
        "hotel seed dataset loaded: {} rooms, {} bookings, {} call logs",
        seeded.rooms, seeded.bookings, seeded.call_logs
    )
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use horizon_db::SeedResult;

    use super::{summary, verification_message};

    #[test]
    fn verification_error_message_targets_failed_checks() {
        assert_eq!(
            verification_message(&["Penthouse", "GH-B9M2"]),
            "Seed verification failed for checks: Penthouse, GH-B9M2"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        assert_eq!(verification_message(&[]), "Some seed data failed to load");
    }

    #[test]
    fn summary_counts_each_table() {
        let seeded = SeedResult { rooms: 25, bookings: 6, call_logs: 3 };
        assert_eq!(
            summary(&seeded),
            "hotel seed dataset loaded: 25 rooms, 6 bookings, 3 call logs"
        );
    }
}
