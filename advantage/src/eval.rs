//! Greedy evaluation of a trained action-value function.
use advantage_core::{explorer::argmax, Env, QFunction};
use anyhow::{Context, Result};

/// Runs `n_episodes` greedy episodes and returns the mean return.
///
/// Episodes end when the environment reports termination or after
/// `max_episode_steps` steps; without a limit of either source, an episode
/// is cut at 10000 steps.
pub fn evaluate<E, Q>(
    env: &mut E,
    q: &Q,
    n_episodes: usize,
    max_episode_steps: Option<usize>,
) -> Result<f32>
where
    E: Env,
    Q: QFunction<Obs = E::Obs>,
{
    let max_steps = max_episode_steps
        .or_else(|| env.max_episode_steps())
        .unwrap_or(10_000);
    let mut total = 0f32;

    for _ in 0..n_episodes {
        let mut obs = env.reset().context("environment reset failed")?;
        for t in 0..max_steps {
            let act = argmax(&q.predict(&obs)?);
            let step = env
                .step(act)
                .with_context(|| format!("environment step failed at step {}", t))?;
            total += step.reward;
            if step.is_done {
                break;
            }
            obs = step.obs;
        }
    }

    Ok(total / n_episodes.max(1) as f32)
}
