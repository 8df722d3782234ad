//! Experience collection.
//!
//! [`TrajectoryCollector`] runs one episode with epsilon-greedy action
//! selection over the policy network and pushes every transition into a
//! replay buffer:
//!
//! 1. Reset the environment to get `o_0`.
//! 2. Select `a_t` with [`epsilon_greedy`] over `Q(o_t, .)`.
//! 3. Apply `a_t`, observe `(o_t+1, r_t, is_done_t)`.
//! 4. Push `(o_t, a_t, r_t, o_t+1, is_done_t)`, rescaled by the [`Normalizer`]
//!    for the enabled flags.
//! 5. Stop when `is_done_t` is set or the episode step limit is reached.
//!
//! With `n_step > 1`, step 4 holds `(o_t, a_t)` back until the rewards of the
//! next `n_step` steps are known, folding them into
//! `r_t + g * r_t+1 + ... + g^(n-1) * r_t+n-1`. When the episode ends first, the
//! held transitions are pushed with the rewards collected so far.
use crate::{
    error::AdvantageError,
    explorer::epsilon_greedy,
    Env, ExperienceBufferBase, IdentityNormalizer, Normalizer, QFunction, Transition,
};
use anyhow::{Context, Result};
use log::trace;
use rand::{rngs::SmallRng, SeedableRng};
use std::collections::VecDeque;

/// Summary of a collected trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryStats {
    /// Sum of raw rewards.
    pub episode_return: f32,

    /// Number of environment steps, equal to the number of pushed transitions.
    pub steps: usize,

    /// Exploration probability used in the episode.
    pub epsilon: f64,

    /// Action values of the policy network at the first observation.
    pub initial_q_values: Vec<f32>,
}

// A transition waiting for the rewards of its later steps.
struct Pending<O> {
    obs: O,
    act: usize,
    reward: f32,
    steps: usize,
}

impl<O> Pending<O> {
    fn into_transition(self, next_obs: O, is_done: bool) -> Transition<O> {
        Transition::new(self.obs, self.act, self.reward, next_obs, is_done)
            .with_bootstrap_steps(self.steps)
    }
}

/// Runs episodes against an environment.
pub struct TrajectoryCollector<N = IdentityNormalizer> {
    rng: SmallRng,
    normalizer: N,
    normalize_obs: bool,
    normalize_reward: bool,
    normalize_act: bool,
    max_episode_steps: Option<usize>,
    n_step: usize,
    discount_factor: f32,
}

impl TrajectoryCollector<IdentityNormalizer> {
    /// Creates a collector storing transitions unchanged.
    pub fn new(seed: u64) -> Self {
        Self::with_normalizer(seed, IdentityNormalizer)
    }
}

impl<N> TrajectoryCollector<N> {
    /// Creates a collector with a normalizer. All flags are off until set with
    /// [`TrajectoryCollector::normalize`].
    pub fn with_normalizer(seed: u64, normalizer: N) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            normalizer,
            normalize_obs: false,
            normalize_reward: false,
            normalize_act: false,
            max_episode_steps: None,
            n_step: 1,
            discount_factor: 1.0,
        }
    }

    /// Sets which parts of a transition are rescaled before being stored.
    pub fn normalize(mut self, reward: bool, obs: bool, act: bool) -> Self {
        self.normalize_reward = reward;
        self.normalize_obs = obs;
        self.normalize_act = act;
        self
    }

    /// Limits the number of steps in an episode, overriding [`Env::max_episode_steps`].
    pub fn max_episode_steps(mut self, v: Option<usize>) -> Self {
        self.max_episode_steps = v;
        self
    }

    /// Folds the rewards of `n` steps, discounted by `discount_factor`, into
    /// each stored transition. `n` is raised to 1 if zero.
    pub fn n_step(mut self, n: usize, discount_factor: f32) -> Self {
        self.n_step = n.max(1);
        self.discount_factor = discount_factor;
        self
    }

    /// Returns the normalizer.
    pub fn normalizer(&self) -> &N {
        &self.normalizer
    }

    /// Runs exactly one episode with exploration probability `eps`.
    ///
    /// By the end of the episode, exactly one transition was pushed per
    /// environment step. Errors from the
    /// environment or the policy end the episode and are returned; transitions
    /// pushed before the error stay in the buffer, the ones still waiting for
    /// later rewards are discarded.
    pub fn collect<E, Q, B>(
        &mut self,
        env: &mut E,
        policy: &Q,
        buffer: &mut B,
        eps: f64,
    ) -> Result<TrajectoryStats>
    where
        E: Env,
        Q: QFunction<Obs = E::Obs>,
        B: ExperienceBufferBase<Item = Transition<E::Obs>>,
        N: Normalizer<E::Obs>,
    {
        let n_actions = env.num_actions();
        if n_actions == 0 {
            return Err(AdvantageError::InvalidConfig(
                "environment has no actions".to_string(),
            )
            .into());
        }
        let max_steps = self.max_episode_steps.or_else(|| env.max_episode_steps());

        let mut obs = env.reset().context("environment reset failed")?;
        let mut stored_obs = self.store_obs(obs.clone());
        let mut episode_return = 0f32;
        let mut steps = 0;
        let mut initial_q_values = vec![];
        let mut pending: VecDeque<Pending<E::Obs>> = VecDeque::with_capacity(self.n_step);

        loop {
            let act = {
                let q = policy.predict(&obs)?;
                if q.len() != n_actions {
                    return Err(AdvantageError::PredictionShape {
                        expected: n_actions,
                        actual: q.len(),
                    }
                    .into());
                }
                if steps == 0 {
                    initial_q_values = q.clone();
                }
                epsilon_greedy(&q, eps, &mut self.rng)
            };
            let step = env
                .step(act)
                .with_context(|| format!("environment step failed at step {}", steps))?;
            episode_return += step.reward;
            steps += 1;

            let stored_next_obs = self.store_obs(step.obs.clone());
            let reward = match self.normalize_reward {
                true => self.normalizer.normalize_reward(step.reward),
                false => step.reward,
            };
            let stored_act = match self.normalize_act {
                true => self.normalizer.normalize_act(act),
                false => act,
            };
            pending.push_back(Pending {
                obs: stored_obs,
                act: stored_act,
                reward: 0.0,
                steps: 0,
            });
            for p in pending.iter_mut() {
                p.reward += self.discount_factor.powi(p.steps as i32) * reward;
                p.steps += 1;
            }
            if pending.front().map_or(false, |p| p.steps == self.n_step) {
                if let Some(p) = pending.pop_front() {
                    buffer.push(p.into_transition(stored_next_obs.clone(), step.is_done));
                }
            }
            trace!("step {}: act = {}, reward = {}", steps, act, step.reward);

            if step.is_done || max_steps.map_or(false, |m| steps >= m) {
                for p in pending.drain(..) {
                    buffer.push(p.into_transition(stored_next_obs.clone(), step.is_done));
                }
                break;
            }
            obs = step.obs;
            stored_obs = stored_next_obs;
        }

        Ok(TrajectoryStats {
            episode_return,
            steps,
            epsilon: eps,
            initial_q_values,
        })
    }

    fn store_obs<O>(&mut self, obs: O) -> O
    where
        N: Normalizer<O>,
    {
        match self.normalize_obs {
            true => self.normalizer.normalize_obs(obs),
            false => obs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{DummyEnv, DummyQFunction, FailingEnv},
        replay_buffer::{ExperienceReplayBuffer, ReplayBufferConfig},
        ReplayBufferBase,
    };

    struct Scale(f32);

    impl Normalizer<Vec<f32>> for Scale {
        fn normalize_obs(&mut self, obs: Vec<f32>) -> Vec<f32> {
            obs.into_iter().map(|x| x * self.0).collect()
        }

        fn normalize_reward(&mut self, reward: f32) -> f32 {
            reward * self.0
        }

        fn normalize_act(&mut self, act: usize) -> usize {
            act
        }
    }

    fn buffer() -> ExperienceReplayBuffer<Vec<f32>> {
        ExperienceReplayBuffer::build(&ReplayBufferConfig::default().capacity(100))
    }

    #[test]
    fn test_one_push_per_step() -> Result<()> {
        // Greedy policy on the corridor walks right and reaches the goal in 4 steps.
        let mut env = DummyEnv::new(5);
        let q = DummyQFunction::prefer(2, 1);
        let mut buffer = buffer();
        let mut collector = TrajectoryCollector::new(0);

        let stats = collector.collect(&mut env, &q, &mut buffer, 0.0)?;
        assert_eq!(stats.steps, 4);
        assert_eq!(buffer.len(), 4);
        assert_eq!(stats.episode_return, 1.0);
        assert_eq!(stats.initial_q_values, vec![0.0, 1.0]);

        let trs = buffer.iter().collect::<Vec<_>>();
        assert!(trs.iter().all(|t| t.act() == 1));
        assert_eq!(trs.iter().filter(|t| t.is_done()).count(), 1);
        assert!(trs[3].is_done());
        for w in trs.windows(2) {
            assert_eq!(w[0].next_obs(), w[1].obs());
        }
        Ok(())
    }

    #[test]
    fn test_max_episode_steps() -> Result<()> {
        // Always moving left never ends the episode.
        let mut env = DummyEnv::new(5);
        let q = DummyQFunction::prefer(2, 0);
        let mut buffer = buffer();
        let mut collector = TrajectoryCollector::new(0).max_episode_steps(Some(7));

        let stats = collector.collect(&mut env, &q, &mut buffer, 0.0)?;
        assert_eq!(stats.steps, 7);
        assert_eq!(buffer.len(), 7);
        assert!(buffer.iter().all(|t| !t.is_done()));
        Ok(())
    }

    #[test]
    fn test_env_limit_is_used() -> Result<()> {
        let mut env = DummyEnv::new(5).with_max_episode_steps(3);
        let q = DummyQFunction::prefer(2, 0);
        let mut buffer = buffer();
        let stats = TrajectoryCollector::new(0).collect(&mut env, &q, &mut buffer, 0.0)?;
        assert_eq!(stats.steps, 3);
        Ok(())
    }

    #[test]
    fn test_normalization_flags() -> Result<()> {
        let mut env = DummyEnv::new(3);
        let q = DummyQFunction::prefer(2, 1);
        let mut buffer = buffer();
        let mut collector =
            TrajectoryCollector::with_normalizer(0, Scale(10.0)).normalize(true, false, false);

        let stats = collector.collect(&mut env, &q, &mut buffer, 0.0)?;
        // The reported return is computed from raw rewards.
        assert_eq!(stats.episode_return, 1.0);
        let last = buffer.iter().last().unwrap();
        assert_eq!(last.reward(), 10.0);
        assert_eq!(last.obs(), &vec![1.0]);
        Ok(())
    }

    fn unpacked(buffer: &ExperienceReplayBuffer<Vec<f32>>) -> Vec<(f32, f32, f32, bool, usize)> {
        buffer
            .iter()
            .map(|t| {
                (
                    t.obs()[0],
                    t.reward(),
                    t.next_obs()[0],
                    t.is_done(),
                    t.bootstrap_steps(),
                )
            })
            .collect()
    }

    #[test]
    fn test_n_step_one() -> Result<()> {
        let mut env = DummyEnv::new(5);
        let q = DummyQFunction::prefer(2, 1);
        let mut buffer = buffer();
        let mut collector = TrajectoryCollector::new(0).n_step(1, 0.5);

        collector.collect(&mut env, &q, &mut buffer, 0.0)?;
        assert_eq!(
            unpacked(&buffer),
            vec![
                (0.0, 0.0, 1.0, false, 1),
                (1.0, 0.0, 2.0, false, 1),
                (2.0, 0.0, 3.0, false, 1),
                (3.0, 1.0, 4.0, true, 1),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_n_step() -> Result<()> {
        let q = DummyQFunction::prefer(2, 1);
        let mut collector = TrajectoryCollector::new(0).n_step(3, 0.5);

        // The goal is 4 steps away, the last 2 transitions cover fewer steps.
        let mut env = DummyEnv::new(5);
        let mut full = buffer();
        let stats = collector.collect(&mut env, &q, &mut full, 0.0)?;
        assert_eq!(stats.steps, 4);
        assert_eq!(
            unpacked(&full),
            vec![
                (0.0, 0.0, 3.0, false, 3),
                (1.0, 0.25, 4.0, true, 3),
                (2.0, 0.5, 4.0, true, 2),
                (3.0, 1.0, 4.0, true, 1),
            ]
        );

        // The episode ends before the first transition covers 3 steps.
        let mut env = DummyEnv::new(3);
        let mut short = buffer();
        collector.collect(&mut env, &q, &mut short, 0.0)?;
        assert_eq!(
            unpacked(&short),
            vec![(0.0, 0.5, 2.0, true, 2), (1.0, 1.0, 2.0, true, 1)]
        );
        Ok(())
    }

    #[test]
    fn test_n_step_truncated() -> Result<()> {
        let mut env = DummyEnv::new(10);
        let q = DummyQFunction::prefer(2, 1);
        let mut buffer = buffer();
        let mut collector = TrajectoryCollector::new(0)
            .n_step(3, 0.5)
            .max_episode_steps(Some(2));

        collector.collect(&mut env, &q, &mut buffer, 0.0)?;
        assert_eq!(
            unpacked(&buffer),
            vec![(0.0, 0.0, 2.0, false, 2), (1.0, 0.0, 2.0, false, 1)]
        );
        Ok(())
    }

    #[test]
    fn test_env_failure() {
        let mut env = FailingEnv::new(2);
        let q = DummyQFunction::prefer(2, 1);
        let mut buffer = buffer();
        let err = TrajectoryCollector::new(0)
            .collect(&mut env, &q, &mut buffer, 0.0)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("environment step failed"));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_prediction_shape() {
        let mut env = DummyEnv::new(5);
        let q = DummyQFunction::prefer(3, 1);
        let mut buffer = buffer();
        let err = TrajectoryCollector::new(0)
            .collect(&mut env, &q, &mut buffer, 0.0)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<AdvantageError>(),
            Some(&AdvantageError::PredictionShape {
                expected: 2,
                actual: 3
            })
        );
    }
}
