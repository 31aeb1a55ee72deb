use arcis::*;

#[encrypted]
mod circuits {
    use arcis::*;

    /// Encrypted running tallies for the yes/no poll.
    pub struct PollTallies {
        yes: u64,
        no: u64,
    }

    /// A single voter's encrypted choice: 0 = no, anything else = yes.
    pub struct Ballot {
        choice: u8,
    }

    /// Initialize both counters to zero.
    #[instruction]
    pub fn init_tallies(mxe: Mxe) -> Enc<Mxe, PollTallies> {
        let tallies = PollTallies { yes: 0, no: 0 };
        mxe.from_arcis(tallies)
    }

    /// Count one ballot.
    ///
    /// Exactly one of the two counters moves by one. MPC evaluates both
    /// branches, so neither the program nor the cluster nodes learn which.
    #[instruction]
    pub fn cast_ballot(
        ballot_ctxt: Enc<Shared, Ballot>,
        tallies_ctxt: Enc<Mxe, PollTallies>,
    ) -> Enc<Mxe, PollTallies> {
        let ballot = ballot_ctxt.to_arcis();
        let mut tallies = tallies_ctxt.to_arcis();

        if ballot.choice == 0u8 {
            tallies.no += 1;
        } else {
            tallies.yes += 1;
        }

        tallies_ctxt.owner.from_arcis(tallies)
    }
}
