use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::errors::SamplerError;

/// A Markov chain that owns its state and can be advanced one step at a time.
pub trait MarkovChain {
    /// Does one iteration of the chain, returning the new current state.
    fn step(&mut self) -> Result<&[f64], SamplerError>;

    /// Get the current state without stepping.
    fn current_state(&self) -> &[f64];

    /// Fraction of steps so far that moved the chain.
    fn acceptance_rate(&self) -> f64;
}

/// Advances `chain` by `n_steps` iterations.
pub fn run_chain<M>(chain: &mut M, n_steps: usize) -> Result<(), SamplerError>
where
    M: MarkovChain + ?Sized,
{
    for _ in 0..n_steps {
        chain.step()?;
    }
    Ok(())
}

/// Like [`run_chain`], but ticks `pb` once per iteration and shows the
/// running acceptance rate as the bar message.
pub fn run_chain_with_progress<M>(
    chain: &mut M,
    n_steps: usize,
    pb: &ProgressBar,
) -> Result<(), SamplerError>
where
    M: MarkovChain + ?Sized,
{
    pb.set_length(n_steps as u64);
    let refresh = (n_steps / 100).max(1);

    for i in 0..n_steps {
        chain.step()?;
        pb.inc(1);
        if i % refresh == 0 {
            pb.set_message(format!("p(accept)≈{:.2}", chain.acceptance_rate()));
        }
    }
    pb.finish_with_message(format!("p(accept)≈{:.2}", chain.acceptance_rate()));
    Ok(())
}

pub(crate) fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// A progress bar for one of several chains sharing `multi`.
pub(crate) fn chain_progress_bar(
    multi: &MultiProgress,
    chain: usize,
    n_steps: usize,
) -> ProgressBar {
    let pb = multi.add(ProgressBar::new(n_steps as u64));
    pb.set_prefix(format!("Chain {chain}"));
    pb.set_style(progress_style());
    pb
}
